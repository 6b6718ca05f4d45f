pub mod provider;
pub mod stream;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Rough token estimate, about four chars per token
/// good enough for trimming history, not for billing
#[inline]
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Which part of the history is sent with the next request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryPolicy {
    /// everything
    #[default]
    Full,
    /// the last `n` user questions and the replies that followed them
    LastQuestions(usize),
    /// the newest messages whose estimated tokens fit the budget
    /// the latest message is always kept
    ApproxTokens(usize),
}

impl MemoryPolicy {
    pub const DEFAULT_QUESTIONS: usize = 5;
    pub const DEFAULT_TOKENS: usize = 5000;
}

impl FromStr for MemoryPolicy {
    type Err = String;

    /// `full`, `questions[:N]` or `tokens[:N]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s.as_str(), None),
        };
        let parse_arg = |default: usize| -> Result<usize, String> {
            match arg {
                None => Ok(default),
                Some(a) => a.trim().parse().map_err(|_| format!("invalid memory size: {a}")),
            }
        };
        match kind {
            "full" => Ok(MemoryPolicy::Full),
            "questions" => Ok(MemoryPolicy::LastQuestions(parse_arg(Self::DEFAULT_QUESTIONS)?)),
            "tokens" => Ok(MemoryPolicy::ApproxTokens(parse_arg(Self::DEFAULT_TOKENS)?)),
            other => Err(format!("unknown memory policy: {other}")),
        }
    }
}

/// Explicit, append-only conversation state
///
/// Passed by `&mut` into each turn; nothing is kept in globals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation with a fixed system prompt, sent first on every turn
    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            messages: Vec::new(),
        }
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    /// Full history, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// History slice selected by `policy`
    pub fn history(&self, policy: MemoryPolicy) -> &[ChatMessage] {
        let start = match policy {
            MemoryPolicy::Full => 0,
            MemoryPolicy::LastQuestions(n) => {
                if n == 0 {
                    self.messages.len()
                } else {
                    self.messages
                        .iter()
                        .enumerate()
                        .rev()
                        .filter(|(_, m)| m.role == Role::User)
                        .nth(n - 1)
                        .map_or(0, |(idx, _)| idx)
                }
            }
            MemoryPolicy::ApproxTokens(budget) => {
                let mut used = 0;
                let mut start = self.messages.len();
                for (idx, message) in self.messages.iter().enumerate().rev() {
                    used += approx_tokens(&message.content);
                    if used > budget && start < self.messages.len() {
                        break;
                    }
                    start = idx;
                }
                start
            }
        };
        &self.messages[start..]
    }

    /// Messages for the next request
    ///
    /// Own system prompt first, then `extra_system` (per-turn grounding),
    /// then the history window.
    pub fn window(&self, policy: MemoryPolicy, extra_system: Option<&str>) -> Vec<ChatMessage> {
        let history = self.history(policy);
        let mut out = Vec::with_capacity(history.len() + 2);
        if let Some(system) = &self.system {
            out.push(ChatMessage::system(system.clone()));
        }
        if let Some(extra) = extra_system {
            out.push(ChatMessage::system(extra));
        }
        out.extend_from_slice(history);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(turns: usize) -> Conversation {
        let mut conv = Conversation::with_system("be brief");
        for i in 0..turns {
            conv.push_user(format!("question {i}"));
            conv.push_assistant(format!("answer {i}"));
        }
        conv
    }

    #[test]
    fn full_window_keeps_everything_after_system_prompts() {
        let conv = chat(2);
        let window = conv.window(MemoryPolicy::Full, Some("grounding"));
        assert_eq!(window.len(), 6);
        assert_eq!(window[0], ChatMessage::system("be brief"));
        assert_eq!(window[1], ChatMessage::system("grounding"));
        assert_eq!(window[2], ChatMessage::user("question 0"));
        assert_eq!(window[5], ChatMessage::assistant("answer 1"));
    }

    #[test]
    fn last_questions_cuts_at_the_nth_latest_user_message() {
        let mut conv = chat(7);
        conv.push_user("question 7");
        let history = conv.history(MemoryPolicy::LastQuestions(2));
        assert_eq!(
            history,
            &[
                ChatMessage::user("question 6"),
                ChatMessage::assistant("answer 6"),
                ChatMessage::user("question 7"),
            ]
        );
        assert_eq!(conv.history(MemoryPolicy::LastQuestions(100)).len(), conv.len());
        assert!(conv.history(MemoryPolicy::LastQuestions(0)).is_empty());
    }

    #[test]
    fn token_budget_keeps_newest_messages() {
        let mut conv = Conversation::new();
        conv.push_user("a".repeat(40)); // 10 tokens
        conv.push_assistant("b".repeat(40)); // 10
        conv.push_user("c".repeat(8)); // 2
        let history = conv.history(MemoryPolicy::ApproxTokens(12));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "b".repeat(40));

        // the latest message survives even over budget
        let history = conv.history(MemoryPolicy::ApproxTokens(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "c".repeat(8));
    }

    #[test]
    fn empty_conversation_windows() {
        let conv = Conversation::new();
        assert!(conv.window(MemoryPolicy::ApproxTokens(10), None).is_empty());
        assert!(conv.history(MemoryPolicy::LastQuestions(3)).is_empty());
    }

    #[test]
    fn memory_policy_parses() {
        assert_eq!("full".parse::<MemoryPolicy>().unwrap(), MemoryPolicy::Full);
        assert_eq!("questions".parse::<MemoryPolicy>().unwrap(), MemoryPolicy::LastQuestions(5));
        assert_eq!("Tokens:300".parse::<MemoryPolicy>().unwrap(), MemoryPolicy::ApproxTokens(300));
        assert!("summary".parse::<MemoryPolicy>().is_err());
        assert!("tokens:lots".parse::<MemoryPolicy>().is_err());
    }

    #[test]
    fn approx_tokens_rounds_up() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("abc"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
