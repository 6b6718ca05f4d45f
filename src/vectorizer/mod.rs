pub mod corpus;
pub mod evaluate;
pub mod serde;
pub mod tfidf;
pub mod token;

use std::marker::PhantomData;

use indexmap::IndexSet;
use tracing::info;

use crate::{
    error::VectorizerError,
    utils::math::fnv1a_terms,
    vectorizer::{
        corpus::{Corpus, Document},
        tfidf::{DefaultTfIdfEngine, TfIdfEngine},
        token::TokenFrequency,
    },
};

/// Dense TF-IDF vector tagged with the vocabulary it was projected into
///
/// Two vectors are only comparable when their fingerprints match.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    fingerprint: u64,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Vocabulary size of the fit that produced this vector
    #[inline]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// True when no vocabulary token was present
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Immutable result of fitting a vectorizer to a corpus
///
/// Internally, it holds:
/// - The vocabulary (token -> dimension index, via `IndexSet` position)
/// - The smoothed IDF weight of each dimension
/// - Document ids and their unit-length TF-IDF rows, in input order
/// - A fingerprint of the vocabulary identifying this fit
///
/// `E` is the weighting engine; queries are projected with the same engine
/// the documents were. A model is never mutated after `fit`; share it through
/// `Arc` and build a new one when the corpus changes.
#[derive(Debug, Clone)]
pub struct FittedModel<E = DefaultTfIdfEngine>
where
    E: TfIdfEngine,
{
    pub(crate) vocabulary: IndexSet<Box<str>>,
    pub(crate) idf: Vec<f64>,
    pub(crate) doc_ids: Vec<String>,
    pub(crate) matrix: Vec<Vec<f64>>,
    pub(crate) fingerprint: u64,
    _marker: PhantomData<E>,
}

impl<E> FittedModel<E>
where
    E: TfIdfEngine,
{
    /// Fit a model on `documents`
    ///
    /// Fails with `EmptyCorpus` on empty input and `DuplicateDocumentId`
    /// when two documents share an id.
    pub fn fit(documents: Vec<Document>) -> Result<Self, VectorizerError> {
        let corpus = Corpus::new(documents)?;
        Ok(Self::fit_corpus(&corpus))
    }

    /// Fit a model on an already analyzed corpus
    pub fn fit_corpus(corpus: &Corpus) -> Self {
        let vocabulary: IndexSet<Box<str>> = corpus.vocabulary().map(Box::from).collect();
        let idf = E::idf_vec(corpus, &vocabulary);
        let matrix = corpus
            .frequencies()
            .iter()
            .map(|freq| E::tf_idf_vec(freq, &vocabulary, &idf))
            .collect();
        let doc_ids = corpus.documents().iter().map(|d| d.id.clone()).collect();

        let model = Self::assemble(vocabulary, idf, doc_ids, matrix);
        info!(
            docs = model.doc_num(),
            vocab = model.vocab_size(),
            "fitted tf-idf model"
        );
        model
    }

    /// Build a model from parts that are known to be consistent
    pub(crate) fn assemble(
        vocabulary: IndexSet<Box<str>>,
        idf: Vec<f64>,
        doc_ids: Vec<String>,
        matrix: Vec<Vec<f64>>,
    ) -> Self {
        let fingerprint = fnv1a_terms(vocabulary.iter().map(|t| t.as_ref()));
        Self {
            vocabulary,
            idf,
            doc_ids,
            matrix,
            fingerprint,
            _marker: PhantomData,
        }
    }

    /// Project `text` into this model's vocabulary space
    ///
    /// Out-of-vocabulary tokens are dropped; text with no known token maps to
    /// the zero vector. Same input, same output.
    pub fn transform(&self, text: &str) -> FeatureVector {
        let freq = TokenFrequency::from_text(text);
        self.transform_freq(&freq)
    }

    /// Project precomputed token counts
    pub fn transform_freq(&self, freq: &TokenFrequency) -> FeatureVector {
        FeatureVector {
            values: E::tf_idf_vec(freq, &self.vocabulary, &self.idf),
            fingerprint: self.fingerprint,
        }
    }

    /// Check that `vector` came from this fit
    pub fn check_vector(&self, vector: &FeatureVector) -> Result<(), VectorizerError> {
        if vector.dim() != self.vocab_size() || vector.fingerprint != self.fingerprint {
            return Err(VectorizerError::DimensionMismatch {
                expected: self.vocab_size(),
                found: vector.dim(),
            });
        }
        Ok(())
    }

    /// Number of documents
    #[inline]
    pub fn doc_num(&self) -> usize {
        self.doc_ids.len()
    }

    /// Vector dimensionality
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn doc_ids(&self) -> &[String] {
        &self.doc_ids
    }

}

/// Fit a model with the default engine
pub fn fit(documents: Vec<Document>) -> Result<FittedModel, VectorizerError> {
    FittedModel::fit(documents)
}

/// Project `text` into `model`'s vocabulary space
pub fn transform<E: TfIdfEngine>(model: &FittedModel<E>, text: &str) -> FeatureVector {
    model.transform(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FittedModel {
        fit(vec![
            Document::new("A", "machine learning basics"),
            Document::new("B", "intro to cooking"),
        ])
        .unwrap()
    }

    #[test]
    fn fit_rejects_empty_corpus() {
        assert_eq!(fit(vec![]).unwrap_err(), VectorizerError::EmptyCorpus);
    }

    #[test]
    fn fit_builds_index_aligned_rows() {
        let model = sample();
        assert_eq!(model.doc_num(), 2);
        assert_eq!(model.doc_ids(), &["A".to_string(), "B".to_string()]);
        assert_eq!(model.vocab_size(), 6);
        assert_eq!(model.matrix.len(), model.doc_num());
        for row in &model.matrix {
            assert_eq!(row.len(), model.vocab_size());
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn transform_is_deterministic() {
        let model = sample();
        let a = transform(&model, "learn machine learning");
        let b = transform(&model, "learn machine learning");
        assert_eq!(a, b);
        assert_eq!(a.dim(), model.vocab_size());
        assert_eq!(a.fingerprint, model.fingerprint());
    }

    #[test]
    fn transform_drops_out_of_vocabulary_tokens() {
        let model = sample();
        assert!(model.transform("unrelated topic about astronomy").is_zero());
        assert!(!model.vocabulary.contains("astronomy"));
        let v = model.transform("cooking astronomy");
        let dim = model.vocabulary.get_index_of("cooking").unwrap();
        assert!((v.values()[dim] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn check_vector_rejects_other_fits() {
        let model = sample();
        let other = fit(vec![Document::new("X", "completely different words here")]).unwrap();
        let foreign = other.transform("different words");
        assert!(matches!(
            model.check_vector(&foreign),
            Err(VectorizerError::DimensionMismatch { .. })
        ));

        // same size, different vocabulary
        let same_size = fit(vec![
            Document::new("A", "alpha beta gamma"),
            Document::new("B", "delta epsilon zeta"),
        ])
        .unwrap();
        assert_eq!(same_size.vocab_size(), model.vocab_size());
        let err = model.check_vector(&same_size.transform("alpha")).unwrap_err();
        assert_eq!(err, VectorizerError::DimensionMismatch { expected: 6, found: 6 });
        assert!(err.to_string().contains("different vocabulary"), "{err}");
        assert!(!err.to_string().contains("found 6"), "{err}");
        assert!(model.check_vector(&model.transform("cooking")).is_ok());
    }

    #[test]
    fn refit_yields_a_new_model() {
        let first = sample();
        let second = fit(vec![
            Document::new("A", "machine learning basics"),
            Document::new("B", "intro to cooking"),
            Document::new("C", "astronomy for beginners"),
        ])
        .unwrap();
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.doc_num(), 2);
    }

    #[test]
    fn idf_prefers_rare_tokens() {
        let model = fit(vec![
            Document::new("a", "rust systems"),
            Document::new("b", "rust web"),
        ])
        .unwrap();
        let idf = |token: &str| model.vocabulary.get_index_of(token).map(|dim| model.idf[dim]);
        assert!(idf("systems").unwrap() > idf("rust").unwrap());
        assert_eq!(idf("python"), None);
    }
}
