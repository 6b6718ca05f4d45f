use std::collections::HashSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    error::PersistError,
    utils::math::fnv1a_terms,
    vectorizer::{tfidf::TfIdfEngine, FittedModel},
};

/// Serializable vectorizer half of a model: vocabulary and IDF weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerData {
    /// tokens in dimension order
    pub vocabulary: Vec<String>,
    pub idf: Vec<f64>,
    pub fingerprint: u64,
}

/// Serializable index half of a model: document ids and their rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexData {
    pub doc_ids: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    /// fingerprint of the vocabulary the rows live in
    pub fingerprint: u64,
}

/// Whole model in one blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub vectorizer: VectorizerData,
    pub index: IndexData,
}

impl<E> FittedModel<E>
where
    E: TfIdfEngine,
{
    pub fn vectorizer_data(&self) -> VectorizerData {
        VectorizerData {
            vocabulary: self.vocabulary.iter().map(|t| t.to_string()).collect(),
            idf: self.idf.clone(),
            fingerprint: self.fingerprint,
        }
    }

    pub fn index_data(&self) -> IndexData {
        IndexData {
            doc_ids: self.doc_ids.clone(),
            matrix: self.matrix.clone(),
            fingerprint: self.fingerprint,
        }
    }

    pub fn to_data(&self) -> ModelData {
        ModelData {
            vectorizer: self.vectorizer_data(),
            index: self.index_data(),
        }
    }

    /// Rebuild a model from its two halves
    ///
    /// Every shape is validated and the fingerprint recomputed; nothing from
    /// the blob is trusted as-is.
    pub fn from_parts(vectorizer: VectorizerData, index: IndexData) -> Result<Self, PersistError> {
        let dims = vectorizer.vocabulary.len();
        if vectorizer.idf.len() != dims {
            return Err(PersistError::Inconsistent(format!(
                "{} idf weights for {} vocabulary tokens",
                vectorizer.idf.len(),
                dims
            )));
        }
        let fingerprint = fnv1a_terms(vectorizer.vocabulary.iter().map(String::as_str));
        if fingerprint != vectorizer.fingerprint || fingerprint != index.fingerprint {
            return Err(PersistError::Inconsistent(
                "vector index and vectorizer come from different fits".into(),
            ));
        }
        if index.doc_ids.is_empty() {
            return Err(PersistError::Inconsistent("index holds no documents".into()));
        }
        if index.doc_ids.len() != index.matrix.len() {
            return Err(PersistError::Inconsistent(format!(
                "{} document ids for {} rows",
                index.doc_ids.len(),
                index.matrix.len()
            )));
        }
        if let Some(row) = index.matrix.iter().find(|row| row.len() != dims) {
            return Err(PersistError::Inconsistent(format!(
                "row of {} dims in a {} dim model",
                row.len(),
                dims
            )));
        }
        let mut seen = HashSet::with_capacity(index.doc_ids.len());
        if let Some(dup) = index.doc_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(PersistError::Inconsistent(format!("duplicate document id {dup}")));
        }

        let vocabulary: IndexSet<Box<str>> = vectorizer
            .vocabulary
            .into_iter()
            .map(String::into_boxed_str)
            .collect();
        if vocabulary.len() != dims {
            return Err(PersistError::Inconsistent("duplicate vocabulary token".into()));
        }
        Ok(Self::assemble(vocabulary, vectorizer.idf, index.doc_ids, index.matrix))
    }
}

/// Encode a model as one CBOR blob
pub fn save<E: TfIdfEngine>(model: &FittedModel<E>) -> Result<Vec<u8>, PersistError> {
    serde_cbor::to_vec(&model.to_data()).map_err(PersistError::Encode)
}

/// Decode a blob written by [`save`]
pub fn load<E: TfIdfEngine>(blob: &[u8]) -> Result<FittedModel<E>, PersistError> {
    let data: ModelData = serde_cbor::from_slice(blob).map_err(PersistError::Decode)?;
    FittedModel::from_parts(data.vectorizer, data.index)
}
