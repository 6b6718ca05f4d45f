use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::{
    error::{PersistError, Result},
    vectorizer::{
        corpus::Document,
        serde::{IndexData, VectorizerData},
        tfidf::TfIdfEngine,
        FittedModel,
    },
};

/// The two on-disk artifacts of a fitted model
///
/// - `index_path`: document ids and TF-IDF rows
/// - `vectorizer_path`: vocabulary and IDF weights
///
/// Both are required together. Single writer, single reader.
#[derive(Debug, Clone)]
pub struct IndexStore {
    pub index_path: PathBuf,
    pub vectorizer_path: PathBuf,
}

impl IndexStore {
    pub fn new(index_path: impl Into<PathBuf>, vectorizer_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            vectorizer_path: vectorizer_path.into(),
        }
    }

    /// True when both artifacts are present
    pub fn exists(&self) -> bool {
        self.index_path.is_file() && self.vectorizer_path.is_file()
    }

    /// Write both artifacts
    ///
    /// Each file is written to a sibling temp file and renamed into place,
    /// so a failed write never truncates a previous good artifact.
    pub fn write<E: TfIdfEngine>(&self, model: &FittedModel<E>) -> Result<(), PersistError> {
        write_artifact(&self.vectorizer_path, &model.vectorizer_data())?;
        write_artifact(&self.index_path, &model.index_data())?;
        info!(
            index = %self.index_path.display(),
            vectorizer = %self.vectorizer_path.display(),
            docs = model.doc_num(),
            "saved model artifacts"
        );
        Ok(())
    }

    /// Read both artifacts back into a model
    pub fn read<E: TfIdfEngine>(&self) -> Result<FittedModel<E>, PersistError> {
        for path in [&self.index_path, &self.vectorizer_path] {
            if !path.is_file() {
                return Err(PersistError::MissingArtifact(path.clone()));
            }
        }
        let vectorizer: VectorizerData = read_artifact(&self.vectorizer_path)?;
        let index: IndexData = read_artifact(&self.index_path)?;
        let model = FittedModel::from_parts(vectorizer, index)?;
        info!(
            docs = model.doc_num(),
            vocab = model.vocab_size(),
            "loaded model artifacts"
        );
        Ok(model)
    }

    /// Load the persisted model, or rebuild it from source
    ///
    /// Any persistence failure (missing half, corrupt blob, mismatched
    /// halves) falls back to `load_documents` + fit + write. Source or fit
    /// failures are returned as-is and leave the artifacts untouched.
    pub fn load_or_fit<E, F>(&self, load_documents: F) -> Result<FittedModel<E>>
    where
        E: TfIdfEngine,
        F: FnOnce() -> Result<Vec<Document>>,
    {
        match self.read() {
            Ok(model) => return Ok(model),
            Err(err) => warn!(error = %err, "persisted model unusable, refitting from source"),
        }
        let documents = load_documents()?;
        let model = FittedModel::fit(documents)?;
        self.write(&model)?;
        Ok(model)
    }

    /// Load the persisted model if it was fitted from exactly `documents`
    ///
    /// Artifacts fitted from another corpus (other ids, or the same ids in
    /// another order) would pair stale rows with fresh text, so they are
    /// replaced by a fit of `documents`.
    pub fn load_or_fit_documents<E: TfIdfEngine>(&self, documents: &[Document]) -> Result<FittedModel<E>> {
        match self.read::<E>() {
            Ok(model) if model.doc_ids().iter().eq(documents.iter().map(|d| &d.id)) => return Ok(model),
            Ok(model) => warn!(
                persisted = model.doc_num(),
                source = documents.len(),
                "persisted model was fitted from other documents, refitting"
            ),
            Err(err) => warn!(error = %err, "persisted model unusable, refitting from source"),
        }
        let model = FittedModel::fit(documents.to_vec())?;
        self.write(&model)?;
        Ok(model)
    }
}

fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_cbor::to_vec(value).map_err(PersistError::Encode)?;
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let bytes = fs::read(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_cbor::from_slice(&bytes).map_err(PersistError::Decode)
}
