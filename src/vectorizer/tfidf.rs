use indexmap::IndexSet;

use crate::{utils::math::l2_normalize, vectorizer::{corpus::Corpus, token::TokenFrequency}};

/// TF-IDF weighting strategy
///
/// `fit` asks the engine for one IDF weight per vocabulary dimension, then
/// for a weight vector per document; `transform` reuses `tf_idf_vec` for
/// queries, so documents and queries always share one rule.
pub trait TfIdfEngine {
    /// IDF vector over `vocabulary`, index-aligned with it
    ///
    /// # Arguments
    /// * `corpus` - analyzed corpus
    /// * `vocabulary` - token dimension order
    fn idf_vec(corpus: &Corpus, vocabulary: &IndexSet<Box<str>>) -> Vec<f64>;

    /// Dense TF-IDF vector for one piece of text
    /// tokens outside `vocabulary` are dropped
    fn tf_idf_vec(freq: &TokenFrequency, vocabulary: &IndexSet<Box<str>>, idf: &[f64]) -> Vec<f64>;
}

/// Default TF-IDF engine
///
/// - tf: raw token count
/// - idf: smoothed, `ln((1 + n) / (1 + df)) + 1`
/// - rows scaled to unit L2 length
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTfIdfEngine;

impl DefaultTfIdfEngine {
    /// Smoothed inverse document frequency
    ///
    /// Acts as if one extra document contained every token, so df = 0 never
    /// divides by zero and a token present everywhere still weighs 1.0.
    #[inline]
    pub fn idf_calc(doc_num: u64, doc_count: u64) -> f64 {
        ((1.0 + doc_num as f64) / (1.0 + doc_count as f64)).ln() + 1.0
    }
}

impl TfIdfEngine for DefaultTfIdfEngine {
    fn idf_vec(corpus: &Corpus, vocabulary: &IndexSet<Box<str>>) -> Vec<f64> {
        let doc_num = corpus.doc_num() as u64;
        vocabulary
            .iter()
            .map(|token| Self::idf_calc(doc_num, corpus.doc_count(token)))
            .collect()
    }

    fn tf_idf_vec(freq: &TokenFrequency, vocabulary: &IndexSet<Box<str>>, idf: &[f64]) -> Vec<f64> {
        let mut vec = vec![0.0; vocabulary.len()];
        if freq.is_empty() {
            return vec;
        }
        for (token, count) in freq.iter() {
            // 語彙外トークンは無視
            if let Some(dim) = vocabulary.get_index_of(token) {
                vec[dim] = count as f64 * idf[dim];
            }
        }
        l2_normalize(&mut vec);
        vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::corpus::Document;

    #[test]
    fn idf_is_smoothed() {
        // token in every document -> 1.0
        assert_eq!(DefaultTfIdfEngine::idf_calc(3, 3), 1.0);
        // rarer tokens weigh more
        assert!(DefaultTfIdfEngine::idf_calc(3, 1) > DefaultTfIdfEngine::idf_calc(3, 2));
        assert!((DefaultTfIdfEngine::idf_calc(2, 1) - ((3.0_f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn tf_idf_vec_drops_unknown_tokens_and_normalizes() {
        let corpus = Corpus::new(vec![
            Document::new("a", "apple banana"),
            Document::new("b", "banana cherry"),
        ])
        .unwrap();
        let vocabulary: IndexSet<Box<str>> = corpus.vocabulary().map(Box::from).collect();
        let idf = DefaultTfIdfEngine::idf_vec(&corpus, &vocabulary);
        assert_eq!(idf.len(), 3);

        let freq = TokenFrequency::from_text("apple apple durian");
        let vec = DefaultTfIdfEngine::tf_idf_vec(&freq, &vocabulary, &idf);
        assert_eq!(vec.len(), 3);
        assert!((vec[0] - 1.0).abs() < 1e-12);
        assert_eq!(vec[1], 0.0);
        assert_eq!(vec[2], 0.0);

        let nothing = DefaultTfIdfEngine::tf_idf_vec(&TokenFrequency::from_text("durian"), &vocabulary, &idf);
        assert!(nothing.iter().all(|&v| v == 0.0));
    }
}
