use std::fmt::Debug;

use rayon::prelude::*;

use crate::{
    error::VectorizerError,
    utils::math::cosine_similarity,
    vectorizer::{tfidf::TfIdfEngine, FeatureVector, FittedModel},
};

/// Ranked search results
pub struct Hits {
    /// (Document ID, Score)
    pub list: Vec<(String, f64)>,
}

impl Hits {
    pub fn new(list: Vec<(String, f64)>) -> Self {
        Hits { list }
    }

    /// Sort results by descending score
    /// stable, so equal scores keep corpus order
    pub fn sort_by_score(&mut self) -> &mut Self {
        // Remove NaN scores
        self.list.retain(|(_, s)| !s.is_nan());
        self.list.sort_by(|a, b| b.1.total_cmp(&a.1));
        self
    }

    /// Keep the first `k` entries
    pub fn truncate(&mut self, k: usize) -> &mut Self {
        self.list.truncate(k);
        self
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Debug for Hits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            writeln!(f, "Hits [")?;
            for (key, score) in &self.list {
                writeln!(f, "    {:?}: {:.6}", key, score)?;
            }
            write!(f, "]")
        } else {
            f.debug_list().entries(&self.list).finish()
        }
    }
}

impl<E> FittedModel<E>
where
    E: TfIdfEngine,
{
    /// Cosine similarity of `query` against every document, in corpus order
    ///
    /// Scoring runs in parallel; the output order is still the corpus order.
    pub fn cosine_scores(&self, query: &FeatureVector) -> Result<Vec<f64>, VectorizerError> {
        self.check_vector(query)?;
        let query = query.values();
        Ok(self
            .matrix
            .par_iter()
            .map(|row| cosine_similarity(row, query))
            .collect())
    }

    /// Top `k` documents by cosine similarity, best first
    pub fn rank(&self, query: &FeatureVector, k: usize) -> Result<Hits, VectorizerError> {
        let scores = self.cosine_scores(query)?;
        let mut hits = Hits::new(self.doc_ids.iter().cloned().zip(scores).collect());
        hits.sort_by_score().truncate(k);
        Ok(hits)
    }
}
