use std::collections::HashSet;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{error::VectorizerError, vectorizer::token::TokenFrequency};

/// One unit of the corpus
/// `raw_text` is plain text, already extracted from its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Ordered, validated document set plus the statistics IDF needs
///
/// Holds:
/// - the documents, in input order
/// - token counts per document
/// - the number of documents each token appears in
///
/// Built only through [`Corpus::new`], so a `Corpus` is never empty and ids
/// are unique.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    frequencies: Vec<TokenFrequency>,
    /// token -> document count, first-seen order
    doc_counts: IndexMap<Box<str>, u64>,
}

impl Corpus {
    /// Validate and analyze a document set
    ///
    /// Tokenization runs in parallel; results keep input order.
    pub fn new(documents: Vec<Document>) -> Result<Self, VectorizerError> {
        if documents.is_empty() {
            return Err(VectorizerError::EmptyCorpus);
        }
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(VectorizerError::DuplicateDocumentId(doc.id.clone()));
            }
        }

        let frequencies: Vec<TokenFrequency> = documents
            .par_iter()
            .map(|doc| TokenFrequency::from_text(&doc.raw_text))
            .collect();

        let mut doc_counts: IndexMap<Box<str>, u64> = IndexMap::new();
        for freq in &frequencies {
            // 文書内のユニーク語ごとに1回だけ数える
            for (token, _) in freq.iter() {
                *doc_counts.entry(token.into()).or_insert(0) += 1;
            }
        }

        Ok(Self {
            documents,
            frequencies,
            doc_counts,
        })
    }

    /// Number of documents
    #[inline]
    pub fn doc_num(&self) -> usize {
        self.documents.len()
    }

    /// Number of documents containing `token`
    #[inline]
    pub fn doc_count(&self, token: &str) -> u64 {
        self.doc_counts.get(token).copied().unwrap_or(0)
    }

    /// Distinct tokens across the corpus, first-seen order
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.doc_counts.keys().map(|k| k.as_ref())
    }

    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.doc_counts.len()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Per-document token counts, index-aligned with [`Corpus::documents`]
    pub fn frequencies(&self) -> &[TokenFrequency] {
        &self.frequencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert_eq!(Corpus::new(vec![]).unwrap_err(), VectorizerError::EmptyCorpus);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Corpus::new(vec![
            Document::new("a", "one"),
            Document::new("b", "two"),
            Document::new("a", "three"),
        ])
        .unwrap_err();
        assert_eq!(err, VectorizerError::DuplicateDocumentId("a".into()));
    }

    #[test]
    fn counts_documents_not_occurrences() {
        let corpus = Corpus::new(vec![
            Document::new("a", "rust rust rust search"),
            Document::new("b", "rust cooking"),
        ])
        .unwrap();
        assert_eq!(corpus.doc_num(), 2);
        assert_eq!(corpus.doc_count("rust"), 2);
        assert_eq!(corpus.doc_count("search"), 1);
        assert_eq!(corpus.doc_count("missing"), 0);
        assert_eq!(corpus.vocabulary().collect::<Vec<_>>(), vec!["rust", "search", "cooking"]);
        assert_eq!(corpus.frequencies()[0].token_count("rust"), 3);
    }
}
