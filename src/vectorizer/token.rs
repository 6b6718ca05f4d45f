use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Minimum token length in chars
/// single characters carry almost no signal for matching
pub const MIN_TOKEN_CHARS: usize = 2;

/// Split text into lowercase word tokens
///
/// A token is a maximal run of alphanumeric characters (`_` included) of at
/// least [`MIN_TOKEN_CHARS`] chars. Everything else separates tokens.
///
/// # Examples
/// ```
/// use corpus_match::vectorizer::token::tokenize;
/// assert_eq!(tokenize("Intro to C++ and Rust!"), vec!["intro", "to", "and", "rust"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|raw| raw.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// TokenFrequency struct
/// Counts how often each token occurs in one piece of text (the raw TF).
/// Tokens keep first-seen order, so iteration is deterministic.
///
/// # Examples
/// ```
/// use corpus_match::TokenFrequency;
/// let mut freq = TokenFrequency::new();
/// freq.add_token("rust");
/// freq.add_token("search");
/// freq.add_token("rust");
///
/// assert_eq!(freq.token_count("rust"), 2);
/// assert_eq!(freq.token_count("go"), 0);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TokenFrequency {
    #[serde(with = "indexmap::map::serde_seq")]
    token_count: IndexMap<String, u32>,
}

impl TokenFrequency {
    /// Create an empty TokenFrequency
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize `text` and count every token
    pub fn from_text(text: &str) -> Self {
        let mut freq = Self::new();
        freq.add_tokens(&tokenize(text));
        freq
    }

    /// Add a token
    ///
    /// # Arguments
    /// * `token` - token to add
    #[inline]
    pub fn add_token(&mut self, token: &str) -> &mut Self {
        let count = self.token_count.entry(token.to_string()).or_insert(0);
        *count += 1;
        self
    }

    /// Add multiple tokens
    ///
    /// # Arguments
    /// * `tokens` - Slice of tokens to add
    #[inline]
    pub fn add_tokens<T>(&mut self, tokens: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for token in tokens {
            self.add_token(token.as_ref());
        }
        self
    }

    /// Occurrence count of `token`, 0 when absent
    #[inline]
    pub fn token_count(&self, token: &str) -> u32 {
        self.token_count.get(token).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.token_count.is_empty()
    }

    /// (token, count) pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.token_count.iter().map(|(token, &count)| (token.as_str(), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("Machine-Learning: a Basics 101 course, I think");
        assert_eq!(tokens, vec!["machine", "learning", "basics", "101", "course", "think"]);
    }

    #[test]
    fn tokenize_handles_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ,.;!? - ").is_empty());
    }

    #[test]
    fn tokenize_keeps_unicode_words() {
        assert_eq!(tokenize("Café Über naïve"), vec!["café", "über", "naïve"]);
    }

    #[test]
    fn frequency_counts_and_keeps_first_seen_order() {
        let freq = TokenFrequency::from_text("rust go rust zig go rust");
        assert_eq!(freq.token_count("rust"), 3);
        assert_eq!(freq.token_count("go"), 2);
        assert_eq!(freq.token_count("python"), 0);
        let order: Vec<&str> = freq.iter().map(|(token, _)| token).collect();
        assert_eq!(order, vec!["rust", "go", "zig"]);
    }

    #[test]
    fn empty_text_counts_nothing() {
        let freq = TokenFrequency::from_text(" - ");
        assert!(freq.is_empty());
        assert_eq!(freq.iter().count(), 0);
    }
}
