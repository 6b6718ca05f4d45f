use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::VectorizerError,
    vectorizer::{tfidf::{DefaultTfIdfEngine, TfIdfEngine}, FeatureVector, FittedModel},
};

/// Best document for a query, or none
///
/// `document_id` is `None` (and `score` 0.0) when no document scored
/// strictly above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub document_id: Option<String>,
    pub score: f64,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self { document_id: None, score: 0.0 }
    }

    pub fn is_match(&self) -> bool {
        self.document_id.is_some()
    }
}

/// Single best document for `query`
///
/// - cosine similarity against every document row
/// - ties go to the lowest corpus index
/// - `threshold` is an exclusive lower bound
///
/// Pure; fails only when `query` was not produced by `model`.
pub fn best_match<E: TfIdfEngine>(
    model: &FittedModel<E>,
    query: &FeatureVector,
    threshold: f64,
) -> Result<MatchResult, VectorizerError> {
    let scores = model.cosine_scores(query)?;

    // 同点は先勝ち (strict >)
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }

    let result = match best {
        Some((idx, score)) if score > threshold => MatchResult {
            document_id: Some(model.doc_ids[idx].clone()),
            score,
        },
        _ => MatchResult::no_match(),
    };
    debug!(?result, threshold, "best match");
    Ok(result)
}

/// Default confidence threshold
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Query front end over a shared model
///
/// Readers take a cheap `Arc` snapshot, so a concurrent [`replace_model`]
/// never exposes a half-built model; the old one lives until its last
/// reader drops it.
///
/// [`replace_model`]: SimilarityMatcher::replace_model
#[derive(Debug)]
pub struct SimilarityMatcher<E = DefaultTfIdfEngine>
where
    E: TfIdfEngine,
{
    model: RwLock<Arc<FittedModel<E>>>,
    threshold: f64,
}

impl<E> SimilarityMatcher<E>
where
    E: TfIdfEngine,
{
    pub fn new(model: Arc<FittedModel<E>>, threshold: f64) -> Self {
        Self {
            model: RwLock::new(model),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Current model snapshot
    pub fn model(&self) -> Arc<FittedModel<E>> {
        match self.model.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a freshly fitted model
    pub fn replace_model(&self, model: Arc<FittedModel<E>>) {
        match self.model.write() {
            Ok(mut guard) => *guard = model,
            Err(poisoned) => *poisoned.into_inner() = model,
        }
    }

    /// Vectorize `text` and return its best match
    pub fn query(&self, text: &str) -> MatchResult {
        let model = self.model();
        let vector = model.transform(text);
        // the vector comes from this very model, so the check cannot fail
        best_match(&model, &vector, self.threshold).unwrap_or_else(|_| MatchResult::no_match())
    }
}
