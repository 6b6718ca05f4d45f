use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fitting a vectorizer or comparing vectors against it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorizerError {
    #[error("cannot fit a vectorizer on an empty corpus")]
    EmptyCorpus,
    #[error("duplicate document id in corpus: {0}")]
    DuplicateDocumentId(String),
    /// The query vector was projected into another fit's vocabulary.
    /// `expected == found` means same size but different terms.
    #[error("feature vector does not belong to this model: {}", mismatch_detail(.expected, .found))]
    DimensionMismatch { expected: usize, found: usize },
}

fn mismatch_detail(expected: &usize, found: &usize) -> String {
    if expected == found {
        format!("built from a different vocabulary of the same size ({expected} dims)")
    } else {
        format!("expected {expected} dims, found {found}")
    }
}

/// Errors raised while reading a corpus source
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed course table: {0}")]
    Csv(#[from] csv::Error),
    #[error("course table is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("no documents found in {0}")]
    NoDocuments(PathBuf),
    #[error("no corpus source configured, set `html_dir` or `course_table`")]
    NoSource,
}

/// Errors raised while saving or loading a fitted model
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("index io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode model: {0}")]
    Encode(#[source] serde_cbor::Error),
    #[error("failed to decode model: {0}")]
    Decode(#[source] serde_cbor::Error),
    #[error("index artifact is missing: {0}")]
    MissingArtifact(PathBuf),
    /// The blob decoded but its parts do not describe one fit
    #[error("persisted model is inconsistent: {0}")]
    Inconsistent(String),
}

/// Errors raised by a chat-completion provider
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0} API key is required to use this model")]
    MissingApiKey(&'static str),
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat provider returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("could not decode chat response: {0}")]
    Decode(String),
    #[error("chat stream failed: {0}")]
    Stream(String),
    #[error("chat provider returned no text")]
    EmptyResponse,
    #[error("unknown model choice: {0}")]
    UnknownModel(String),
}

/// Errors raised by the url and weather fetchers
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("{0} API key is required for this lookup")]
    MissingApiKey(&'static str),
}

/// Crate-wide error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Vectorizer(#[from] VectorizerError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
