use std::{fmt, str::FromStr};

use crate::{fetch::WeatherReport, vectorizer::evaluate::matcher::MatchResult};

/// Summary shapes offered for a fetched document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryStyle {
    #[default]
    Words100,
    TwoParagraphs,
    FiveBullets,
}

impl SummaryStyle {
    /// Instruction sentence, written in `language`
    pub fn instruction(&self, language: &str) -> String {
        match self {
            SummaryStyle::Words100 => format!("Summarize the document in about 100 words in {language}."),
            SummaryStyle::TwoParagraphs => {
                format!("Summarize the document in 2 connecting paragraphs in {language}.")
            }
            SummaryStyle::FiveBullets => format!("Summarize the document in 5 bullet points in {language}."),
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "words" | "100" | "100-words" => Ok(SummaryStyle::Words100),
            "paragraphs" | "2-paragraphs" => Ok(SummaryStyle::TwoParagraphs),
            "bullets" | "5-bullets" => Ok(SummaryStyle::FiveBullets),
            other => Err(format!("unknown summary style: {other}")),
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryStyle::Words100 => "100-words",
            SummaryStyle::TwoParagraphs => "2-paragraphs",
            SummaryStyle::FiveBullets => "5-bullets",
        })
    }
}

/// User message carrying a whole document followed by an instruction
pub fn document_prompt(document: &str, instruction: &str) -> String {
    format!("Here's a document: {document} \n\n---\n\n {instruction}")
}

/// Instruction closing the document prompt of a multi-turn document chat
pub const DOCUMENT_CHAT_INSTRUCTION: &str =
    "Answer the questions that follow using this document. Say so when the document does not cover a question.";

/// Join fetched pages into one document, each labelled with its url
pub fn join_sources<S: AsRef<str>>(sources: &[(S, S)]) -> String {
    sources
        .iter()
        .map(|(url, text)| format!("Source: {}\n{}", url.as_ref(), text.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n===\n\n")
}

/// System message describing current weather
pub fn weather_context(report: &WeatherReport) -> String {
    format!(
        "The weather in {} is:\n\
         Temperature: {}°C\n\
         Feels Like: {}°C\n\
         Min Temperature: {}°C\n\
         Max Temperature: {}°C\n\
         Humidity: {}%",
        report.city,
        report.temperature,
        report.feels_like,
        report.min_temp,
        report.max_temp,
        report.humidity,
    )
}

/// System message grounding an answer in the matched document
///
/// `document` is the matched document's text, if the caller has it.
pub fn grounding_prompt(result: &MatchResult, document: Option<&str>) -> String {
    match (&result.document_id, document) {
        (Some(id), Some(text)) => format!(
            "The most relevant document is \"{id}\" (similarity {:.3}). \
             Use it to answer the user's question, and say so when it does not cover the question.\n\n\
             ---\n{text}\n---",
            result.score
        ),
        (Some(id), None) => format!(
            "The most relevant document is \"{id}\" (similarity {:.3}). \
             Refer the user to it where it helps.",
            result.score
        ),
        (None, _) => "No document in the collection matched the user's question. \
                      Answer from general knowledge and say that no matching document was found."
            .to_string(),
    }
}

/// Truncate to at most `max_chars` chars, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_instructions_follow_style_and_language() {
        assert_eq!(
            SummaryStyle::FiveBullets.instruction("French"),
            "Summarize the document in 5 bullet points in French."
        );
        assert_eq!("paragraphs".parse::<SummaryStyle>().unwrap(), SummaryStyle::TwoParagraphs);
        assert_eq!(SummaryStyle::default().to_string(), "100-words");
        assert!("haiku".parse::<SummaryStyle>().is_err());
    }

    #[test]
    fn document_prompt_layout() {
        assert_eq!(document_prompt("DOC", "Do it."), "Here's a document: DOC \n\n---\n\n Do it.");
    }

    #[test]
    fn sources_are_labelled_and_separated() {
        assert_eq!(join_sources(&[("a.com", "one")]), "Source: a.com\none");
        assert_eq!(
            join_sources(&[("a.com", "one"), ("b.org", "two")]),
            "Source: a.com\none\n\n===\n\nSource: b.org\ntwo"
        );
        assert_eq!(join_sources::<&str>(&[]), "");
    }

    #[test]
    fn weather_context_lists_every_field() {
        let report = WeatherReport {
            city: "London".into(),
            temperature: 12.5,
            feels_like: 11.0,
            min_temp: 10.25,
            max_temp: 14.0,
            humidity: 80.0,
        };
        let text = weather_context(&report);
        assert!(text.starts_with("The weather in London is:\n"));
        assert!(text.contains("Temperature: 12.5°C"));
        assert!(text.contains("Min Temperature: 10.25°C"));
        assert!(text.ends_with("Humidity: 80%"));
    }

    #[test]
    fn grounding_prompt_covers_match_and_no_match() {
        let hit = MatchResult { document_id: Some("IST 707".into()), score: 0.4567 };
        let with_text = grounding_prompt(&hit, Some("Applied machine learning"));
        assert!(with_text.contains("\"IST 707\" (similarity 0.457)"));
        assert!(with_text.contains("Applied machine learning"));
        assert!(!grounding_prompt(&hit, None).contains("---"));
        assert!(grounding_prompt(&MatchResult::no_match(), None).starts_with("No document"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
