use std::{fmt, str::FromStr};

use async_trait::async_trait;
use eventsource_stream::Event;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    chat::{
        stream::{decode_chunks, ChunkStream, DecodeFn, Decoded},
        ChatMessage, Role,
    },
    config::AppConfig,
    error::ChatError,
};

/// Reply size cap sent to providers that require one
pub const MAX_OUTPUT_TOKENS: u32 = 1024;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Whether the caller wants the reply in one piece or chunk by chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    Text,
    Stream,
}

/// Reply of a chat-completion call
pub enum Completion {
    Text(String),
    Stream(ChunkStream),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl Completion {
    /// Hand every chunk to `on_chunk` as it arrives and return the whole text
    ///
    /// A plain `Text` reply is delivered as a single chunk.
    pub async fn drain<F>(self, mut on_chunk: F) -> Result<String, ChatError>
    where
        F: FnMut(&str),
    {
        match self {
            Completion::Text(text) => {
                on_chunk(&text);
                Ok(text)
            }
            Completion::Stream(mut stream) => {
                let mut full = String::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    on_chunk(&chunk);
                    full.push_str(&chunk);
                }
                Ok(full)
            }
        }
    }
}

/// Anything that turns role-tagged messages into a reply
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], mode: CompletionMode) -> Result<Completion, ChatError>;
}

/// Closed set of user-selectable models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Gpt4o,
    Gpt4,
    Gpt35Turbo,
    GeminiPro,
    GeminiFlash,
    ClaudeSonnet,
    ClaudeHaiku,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 7] = [
        ModelChoice::Gpt4o,
        ModelChoice::Gpt4,
        ModelChoice::Gpt35Turbo,
        ModelChoice::GeminiPro,
        ModelChoice::GeminiFlash,
        ModelChoice::ClaudeSonnet,
        ModelChoice::ClaudeHaiku,
    ];

    /// Wire name of the model
    pub fn model_name(&self) -> &'static str {
        match self {
            ModelChoice::Gpt4o => "gpt-4o",
            ModelChoice::Gpt4 => "gpt-4",
            ModelChoice::Gpt35Turbo => "gpt-3.5-turbo",
            ModelChoice::GeminiPro => "gemini-1.5-pro",
            ModelChoice::GeminiFlash => "gemini-1.5-flash",
            ModelChoice::ClaudeSonnet => "claude-3-5-sonnet-latest",
            ModelChoice::ClaudeHaiku => "claude-3-5-haiku-latest",
        }
    }

    /// Human label for menus
    pub fn label(&self) -> &'static str {
        match self {
            ModelChoice::Gpt4o => "OpenAI GPT-4o",
            ModelChoice::Gpt4 => "OpenAI GPT-4",
            ModelChoice::Gpt35Turbo => "OpenAI GPT-3.5",
            ModelChoice::GeminiPro => "Google Gemini Pro",
            ModelChoice::GeminiFlash => "Google Gemini Flash",
            ModelChoice::ClaudeSonnet => "Claude Sonnet",
            ModelChoice::ClaudeHaiku => "Claude Haiku",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for ModelChoice {
    type Err = ChatError;

    /// Accepts wire names, labels and short aliases, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let alias = match wanted.as_str() {
            "gpt4o" | "4o" => Some(ModelChoice::Gpt4o),
            "gpt4" | "openai" => Some(ModelChoice::Gpt4),
            "gpt-3.5" | "gpt3.5" | "gpt-35" => Some(ModelChoice::Gpt35Turbo),
            "gemini" => Some(ModelChoice::GeminiPro),
            "claude" => Some(ModelChoice::ClaudeSonnet),
            _ => None,
        };
        alias
            .or_else(|| {
                ModelChoice::ALL.into_iter().find(|m| {
                    m.model_name() == wanted || m.label().to_ascii_lowercase() == wanted
                })
            })
            .ok_or_else(|| ChatError::UnknownModel(s.to_string()))
    }
}

/// Connection settings shared by every provider variant
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    http: Client,
}

impl Endpoint {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Shared http client, reusable for side requests such as url fetches
    pub fn http(&self) -> &Client {
        &self.http
    }
}

/// Hosted chat-completion providers
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(Endpoint),
    Gemini(Endpoint),
    Claude(Endpoint),
}

impl Provider {
    /// Provider for `choice`, keyed from `config`
    ///
    /// Fails before any network i/o when the key for that provider is unset.
    pub fn select(choice: ModelChoice, config: &AppConfig) -> Result<Self, ChatError> {
        let key = |key: &Option<String>, name: &'static str| {
            key.as_deref()
                .filter(|k| !k.trim().is_empty())
                .map(str::to_string)
                .ok_or(ChatError::MissingApiKey(name))
        };
        let model = choice.model_name();
        let provider = match choice {
            ModelChoice::Gpt4o | ModelChoice::Gpt4 | ModelChoice::Gpt35Turbo => Provider::OpenAi(
                Endpoint::new(model, key(&config.openai_api_key, "OpenAI")?, &config.openai_base_url),
            ),
            ModelChoice::GeminiPro | ModelChoice::GeminiFlash => Provider::Gemini(Endpoint::new(
                model,
                key(&config.gemini_api_key, "Google Gemini")?,
                &config.gemini_base_url,
            )),
            ModelChoice::ClaudeSonnet | ModelChoice::ClaudeHaiku => Provider::Claude(Endpoint::new(
                model,
                key(&config.claude_api_key, "Claude")?,
                &config.claude_base_url,
            )),
        };
        info!(provider = provider.name(), model, "selected chat provider");
        Ok(provider)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::Gemini(_) => "gemini",
            Provider::Claude(_) => "claude",
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Provider::OpenAi(e) | Provider::Gemini(e) | Provider::Claude(e) => e,
        }
    }

    /// Build the http request for `messages`
    pub fn request(&self, messages: &[ChatMessage], mode: CompletionMode) -> RequestBuilder {
        let stream = mode == CompletionMode::Stream;
        match self {
            Provider::OpenAi(ep) => ep
                .http
                .post(format!("{}/chat/completions", ep.base_url))
                .bearer_auth(&ep.api_key)
                .json(&openai_body(&ep.model, messages, stream)),
            Provider::Gemini(ep) => {
                let url = if stream {
                    format!("{}/models/{}:streamGenerateContent?alt=sse", ep.base_url, ep.model)
                } else {
                    format!("{}/models/{}:generateContent", ep.base_url, ep.model)
                };
                ep.http
                    .post(url)
                    .header("x-goog-api-key", &ep.api_key)
                    .json(&gemini_body(messages))
            }
            Provider::Claude(ep) => ep
                .http
                .post(format!("{}/messages", ep.base_url))
                .header("x-api-key", &ep.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&claude_body(&ep.model, messages, stream)),
        }
    }

    fn decode_event(&self) -> DecodeFn {
        match self {
            Provider::OpenAi(_) => openai_event,
            Provider::Gemini(_) => gemini_event,
            Provider::Claude(_) => claude_event,
        }
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        match self {
            Provider::OpenAi(_) => openai_text(body),
            Provider::Gemini(_) => gemini_text(body),
            Provider::Claude(_) => claude_text(body),
        }
    }
}

#[async_trait]
impl ChatBackend for Provider {
    async fn complete(&self, messages: &[ChatMessage], mode: CompletionMode) -> Result<Completion, ChatError> {
        debug!(provider = self.name(), messages = messages.len(), ?mode, "chat request");
        let response = check_status(self.request(messages, mode).send().await?).await?;
        match mode {
            CompletionMode::Stream => Ok(Completion::Stream(decode_chunks(
                response.bytes_stream(),
                self.decode_event(),
            ))),
            CompletionMode::Text => {
                let body: Value = response.json().await?;
                self.extract_text(&body)
                    .filter(|t| !t.is_empty())
                    .map(Completion::Text)
                    .ok_or(ChatError::EmptyResponse)
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status {
        code: status.as_u16(),
        body,
    })
}

fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let rest = messages.iter().filter(|m| m.role != Role::System).collect();
    ((!system.is_empty()).then(|| system.join("\n\n")), rest)
}

fn parse_json(data: &str) -> Result<Value, ChatError> {
    serde_json::from_str(data).map_err(|e| ChatError::Decode(format!("{e}: {data}")))
}

fn concat_parts<'a>(parts: impl Iterator<Item = &'a Value>, key: &str) -> String {
    parts.filter_map(|p| p.get(key).and_then(Value::as_str)).collect()
}

// ---- openai ----

fn openai_body(model: &str, messages: &[ChatMessage], stream: bool) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    })
}

fn openai_event(event: &Event) -> Result<Decoded, ChatError> {
    if event.data.trim() == "[DONE]" {
        return Ok(Decoded::Done);
    }
    let value = parse_json(&event.data)?;
    if let Some(err) = value.get("error") {
        return Err(ChatError::Decode(err.to_string()));
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map_or(Decoded::Skip, |t| Decoded::Chunk(t.to_string())))
}

fn openai_text(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ---- gemini ----

fn gemini_body(messages: &[ChatMessage]) -> Value {
    let (system, rest) = split_system(messages);
    let contents: Vec<Value> = rest
        .iter()
        .map(|m| {
            let role = if m.role == Role::Assistant { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();
    let mut body = json!({ "contents": contents });
    if let Some(system) = system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn gemini_event(event: &Event) -> Result<Decoded, ChatError> {
    let value = parse_json(&event.data)?;
    if let Some(err) = value.get("error") {
        return Err(ChatError::Decode(err.to_string()));
    }
    Ok(gemini_text(&value).map_or(Decoded::Skip, Decoded::Chunk))
}

fn gemini_text(body: &Value) -> Option<String> {
    body.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| concat_parts(parts.iter(), "text"))
}

// ---- claude ----

fn claude_body(model: &str, messages: &[ChatMessage], stream: bool) -> Value {
    let (system, rest) = split_system(messages);
    let mut body = json!({
        "model": model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": rest,
        "stream": stream,
    });
    if let Some(system) = system {
        body["system"] = Value::String(system);
    }
    body
}

fn claude_event(event: &Event) -> Result<Decoded, ChatError> {
    let value = parse_json(&event.data)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(event.event.as_str());
    match kind {
        "content_block_delta" => Ok(value
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .map_or(Decoded::Skip, |t| Decoded::Chunk(t.to_string()))),
        "message_stop" => Ok(Decoded::Done),
        "error" => Err(ChatError::Decode(
            value.get("error").map_or_else(|| value.to_string(), Value::to_string),
        )),
        _ => Ok(Decoded::Skip),
    }
}

fn claude_text(body: &Value) -> Option<String> {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| concat_parts(blocks.iter().filter(|b| b["type"] == "text"), "text"))
}
