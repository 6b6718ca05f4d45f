/// This crate matches free-text questions against a document collection with a
/// TF-IDF vectorizer, and grounds chat-completion answers in the best match.
pub mod vectorizer;
pub mod utils;
pub mod error;
pub mod source;
pub mod store;
pub mod config;
pub mod chat;
pub mod prompt;
pub mod fetch;
pub mod assistant;

/// Fitted TF-IDF model
/// The immutable result of fitting a document collection.
/// It holds:
/// - The vocabulary, where a term's position is its dimension
/// - The smoothed IDF weight of every term
/// - The ordered document ids and one L2-normalised row per document
/// - A fingerprint of the vocabulary
///
/// `FittedModel<E>` is generic over the TF-IDF engine `E`
/// (`DefaultTfIdfEngine` unless stated otherwise).
///
/// The model is never mutated after fitting; share it with `Arc` and swap a
/// refit in through `SimilarityMatcher::replace_model`.
///
/// # Serialization
/// Supported through `save` / `load`, or split into `VectorizerData` and
/// `IndexData` for the two on-disk artifacts.
pub use vectorizer::FittedModel;

/// Feature Vector
/// A query or document projected onto a model's vocabulary.
/// It carries the fingerprint of the vocabulary it was built from, so it can
/// not be scored against a different fit.
pub use vectorizer::FeatureVector;

/// Fit and transform entry points
/// `fit` builds a `FittedModel` from documents, `transform` projects a text
/// onto a fitted model.
pub use vectorizer::{fit, transform};

/// Corpus and Document
/// `Document` is an id plus raw text. `Corpus` is the tokenized collection
/// (term counts per document and document frequency per term) a model is fitted from.
pub use vectorizer::corpus::{Corpus, Document};

/// Token Frequency structure
/// Occurrence counts of each token within one text.
/// Used as the raw TF of the TF-IDF weighting.
pub use vectorizer::token::TokenFrequency;

/// TF IDF Calculation Engine Trait
/// Defines how IDF weights and document rows are computed.
/// `DefaultTfIdfEngine` uses the raw term count and the smoothed IDF
/// `ln((1 + n) / (1 + df)) + 1`.
pub use vectorizer::tfidf::{DefaultTfIdfEngine, TfIdfEngine};

/// Matching
/// - `best_match`: single best document above a threshold
/// - `SimilarityMatcher`: thread-safe front end holding a swappable model
/// - `MatchResult`: matched id (or none) and its score
pub use vectorizer::evaluate::matcher::{best_match, MatchResult, SimilarityMatcher};

/// Ranked results
/// Document ids with their cosine scores, best first.
pub use vectorizer::evaluate::scoring::Hits;

/// Persistence
/// `save` / `load` encode a whole model in one CBOR blob, `IndexStore` keeps
/// the vectorizer and the document index as two files.
pub use vectorizer::serde::{load, save};
pub use store::IndexStore;

/// Crate error
pub use error::{Error, Result};
