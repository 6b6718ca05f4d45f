use std::{collections::HashMap, sync::Arc};

use tracing::info;

use crate::{
    chat::{
        provider::{ChatBackend, CompletionMode},
        ChatMessage, Conversation, MemoryPolicy,
    },
    error::ChatError,
    fetch::WeatherReport,
    prompt::{
        document_prompt, grounding_prompt, truncate_chars, weather_context, SummaryStyle,
        DOCUMENT_CHAT_INSTRUCTION,
    },
    vectorizer::{
        corpus::Document,
        evaluate::matcher::{MatchResult, SimilarityMatcher},
    },
};

/// Outcome of one grounded turn
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub matched: MatchResult,
    pub reply: String,
}

/// Send `grounding`, the history window and `question`, then record the
/// exchange once the reply has fully drained
async fn grounded_reply<B, F>(
    backend: &B,
    conversation: &mut Conversation,
    grounding: &str,
    question: &str,
    memory: MemoryPolicy,
    mode: CompletionMode,
    on_chunk: F,
) -> Result<String, ChatError>
where
    B: ChatBackend,
    F: FnMut(&str),
{
    let mut messages = conversation.window(memory, Some(grounding));
    messages.push(ChatMessage::user(question));

    let reply = backend.complete(&messages, mode).await?.drain(on_chunk).await?;
    conversation.push_user(question);
    conversation.push_assistant(reply.clone());
    Ok(reply)
}

/// Retrieval-grounded chat turns
///
/// Each turn matches the question against the corpus first, then calls the
/// backend with the grounding, the history window and the question. The
/// matcher never runs while a reply is streaming.
pub struct Assistant<B> {
    backend: B,
    matcher: Arc<SimilarityMatcher>,
    /// document id -> text quoted into the grounding prompt
    texts: HashMap<String, String>,
    memory: MemoryPolicy,
    mode: CompletionMode,
}

impl<B: ChatBackend> Assistant<B> {
    pub fn new(backend: B, matcher: Arc<SimilarityMatcher>) -> Self {
        Self {
            backend,
            matcher,
            texts: HashMap::new(),
            memory: MemoryPolicy::default(),
            mode: CompletionMode::Stream,
        }
    }

    /// Quote matched documents into the prompt, each cut to `max_chars`
    pub fn with_documents(mut self, documents: &[Document], max_chars: usize) -> Self {
        self.texts = documents
            .iter()
            .map(|d| (d.id.clone(), truncate_chars(&d.raw_text, max_chars).to_string()))
            .collect();
        self
    }

    pub fn with_memory(mut self, memory: MemoryPolicy) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Answer `question` in `conversation`
    ///
    /// `on_chunk` sees the reply as it streams. The question and the full
    /// reply are appended only once the reply is complete, so a failed call
    /// leaves the conversation as it was.
    pub async fn handle_turn<F>(
        &self,
        conversation: &mut Conversation,
        question: &str,
        on_chunk: F,
    ) -> Result<Turn, ChatError>
    where
        F: FnMut(&str),
    {
        let matched = self.matcher.query(question);
        let text = matched
            .document_id
            .as_ref()
            .and_then(|id| self.texts.get(id))
            .map(String::as_str);
        info!(document = ?matched.document_id, score = matched.score, "grounding turn");

        let grounding = grounding_prompt(&matched, text);
        let reply = grounded_reply(
            &self.backend,
            conversation,
            &grounding,
            question,
            self.memory,
            self.mode,
            on_chunk,
        )
        .await?;
        Ok(Turn { matched, reply })
    }
}

/// Multi-turn chat about one fixed document
///
/// Every request opens with the document prompt, followed by the history
/// window under the memory policy and the new question.
pub struct DocumentChat<B> {
    backend: B,
    grounding: String,
    memory: MemoryPolicy,
    mode: CompletionMode,
}

impl<B: ChatBackend> DocumentChat<B> {
    pub fn new(backend: B, document: &str) -> Self {
        Self {
            backend,
            grounding: document_prompt(document, DOCUMENT_CHAT_INSTRUCTION),
            memory: MemoryPolicy::default(),
            mode: CompletionMode::Stream,
        }
    }

    pub fn with_memory(mut self, memory: MemoryPolicy) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Answer `question` about the document, appending on success only
    pub async fn handle_turn<F>(
        &self,
        conversation: &mut Conversation,
        question: &str,
        on_chunk: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str),
    {
        grounded_reply(
            &self.backend,
            conversation,
            &self.grounding,
            question,
            self.memory,
            self.mode,
            on_chunk,
        )
        .await
    }
}

/// Summarize a fetched document
pub async fn summarize<B, F>(
    backend: &B,
    document: &str,
    style: SummaryStyle,
    language: &str,
    mode: CompletionMode,
    on_chunk: F,
) -> Result<String, ChatError>
where
    B: ChatBackend,
    F: FnMut(&str),
{
    let prompt = document_prompt(document, &style.instruction(language));
    backend.complete(&[ChatMessage::user(prompt)], mode).await?.drain(on_chunk).await
}

/// Answer a question with current weather as context
pub async fn weather_answer<B, F>(
    backend: &B,
    report: &WeatherReport,
    question: &str,
    mode: CompletionMode,
    on_chunk: F,
) -> Result<String, ChatError>
where
    B: ChatBackend,
    F: FnMut(&str),
{
    let messages = [ChatMessage::system(weather_context(report)), ChatMessage::user(question)];
    backend.complete(&messages, mode).await?.drain(on_chunk).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::{stream, StreamExt};

    use super::*;
    use crate::{
        chat::{provider::Completion, Role},
        vectorizer::fit,
    };

    /// Replays canned chunks and records what it was sent
    struct Scripted {
        chunks: Vec<&'static str>,
        fail: bool,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self { chunks, fail: false, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        async fn complete(&self, messages: &[ChatMessage], mode: CompletionMode) -> Result<Completion, ChatError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(ChatError::EmptyResponse);
            }
            Ok(match mode {
                CompletionMode::Text => Completion::Text(self.chunks.concat()),
                CompletionMode::Stream => Completion::Stream(
                    stream::iter(self.chunks.clone().into_iter().map(|c| Ok(c.to_string()))).boxed(),
                ),
            })
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new("A", "machine learning basics"),
            Document::new("B", "intro to cooking"),
        ]
    }

    fn assistant(backend: Scripted) -> Assistant<Scripted> {
        let model = Arc::new(fit(docs()).unwrap());
        Assistant::new(backend, Arc::new(SimilarityMatcher::new(model, 0.1))).with_documents(&docs(), 3000)
    }

    #[tokio::test]
    async fn turn_grounds_streams_and_appends() {
        let bot = assistant(Scripted::new(vec!["Start ", "with ", "A."]));
        let mut conv = Conversation::new();
        let mut streamed = Vec::new();

        let turn = bot
            .handle_turn(&mut conv, "learn machine learning", |c| streamed.push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(turn.matched.document_id.as_deref(), Some("A"));
        assert_eq!(turn.reply, "Start with A.");
        assert_eq!(streamed, vec!["Start ", "with ", "A."]);
        assert_eq!(
            conv.messages(),
            &[ChatMessage::user("learn machine learning"), ChatMessage::assistant("Start with A.")]
        );

        let sent = &bot.backend.seen.lock().unwrap()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("machine learning basics"));
        assert_eq!(sent[1], ChatMessage::user("learn machine learning"));
    }

    #[tokio::test]
    async fn no_match_turn_still_answers() {
        let bot = assistant(Scripted::new(vec!["No idea."])).with_mode(CompletionMode::Text);
        let mut conv = Conversation::new();
        let turn = bot.handle_turn(&mut conv, "astronomy", |_| {}).await.unwrap();
        assert_eq!(turn.matched, MatchResult::no_match());
        assert_eq!(turn.reply, "No idea.");
        let sent = &bot.backend.seen.lock().unwrap()[0];
        assert!(sent[0].content.starts_with("No document"));
    }

    #[tokio::test]
    async fn history_window_is_sent_on_later_turns() {
        let bot = assistant(Scripted::new(vec!["ok"])).with_memory(MemoryPolicy::LastQuestions(1));
        let mut conv = Conversation::new();
        for q in ["cooking", "machine learning", "basics"] {
            bot.handle_turn(&mut conv, q, |_| {}).await.unwrap();
        }
        assert_eq!(conv.len(), 6);
        let seen = bot.backend.seen.lock().unwrap();
        // grounding + previous question + its reply + new question
        let last = &seen[2];
        assert_eq!(last.len(), 4);
        assert_eq!(last[1], ChatMessage::user("machine learning"));
        assert_eq!(last[3], ChatMessage::user("basics"));
    }

    #[tokio::test]
    async fn failed_call_leaves_conversation_untouched() {
        let mut backend = Scripted::new(vec![]);
        backend.fail = true;
        let bot = assistant(backend);
        let mut conv = Conversation::new();
        assert!(bot.handle_turn(&mut conv, "cooking", |_| {}).await.is_err());
        assert!(conv.is_empty());
    }

    #[tokio::test]
    async fn document_chat_opens_every_request_with_the_document() {
        let chat = DocumentChat::new(Scripted::new(vec!["Sure."]), "PAGE TEXT")
            .with_memory(MemoryPolicy::LastQuestions(1));
        let mut conv = Conversation::new();
        for q in ["What is it about?", "Who wrote it?", "When?"] {
            assert_eq!(chat.handle_turn(&mut conv, q, |_| {}).await.unwrap(), "Sure.");
        }
        assert_eq!(conv.len(), 6);

        let seen = chat.backend.seen.lock().unwrap();
        let opening = document_prompt("PAGE TEXT", DOCUMENT_CHAT_INSTRUCTION);
        assert!(seen.iter().all(|sent| sent[0] == ChatMessage::system(opening.clone())));
        assert_eq!(seen[0].len(), 2);
        // only the most recent question and its reply are kept
        assert_eq!(
            seen[2][1..],
            [
                ChatMessage::user("Who wrote it?"),
                ChatMessage::assistant("Sure."),
                ChatMessage::user("When?"),
            ]
        );
    }

    #[tokio::test]
    async fn document_chat_failure_keeps_history() {
        let mut backend = Scripted::new(vec![]);
        backend.fail = true;
        let chat = DocumentChat::new(backend, "PAGE").with_mode(CompletionMode::Text);
        let mut conv = Conversation::new();
        conv.push_user("earlier");
        conv.push_assistant("reply");
        assert!(chat.handle_turn(&mut conv, "next", |_| {}).await.is_err());
        assert_eq!(conv.len(), 2);
    }

    #[tokio::test]
    async fn summarize_and_weather_build_their_prompts() {
        let backend = Scripted::new(vec!["fine"]);
        let out = summarize(&backend, "DOC", SummaryStyle::FiveBullets, "Spanish", CompletionMode::Stream, |_| {}).await.unwrap();
        assert_eq!(out, "fine");

        let report = WeatherReport {
            city: "London".into(),
            temperature: 9.0,
            feels_like: 7.5,
            min_temp: 8.0,
            max_temp: 10.0,
            humidity: 90.0,
        };
        weather_answer(&backend, &report, "What should I wear?", CompletionMode::Text, |_| {}).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            vec![ChatMessage::user("Here's a document: DOC \n\n---\n\n Summarize the document in 5 bullet points in Spanish.")]
        );
        assert_eq!(seen[1][0].role, Role::System);
        assert!(seen[1][0].content.contains("Feels Like: 7.5°C"));
        assert_eq!(seen[1][1], ChatMessage::user("What should I wear?"));
    }
}
