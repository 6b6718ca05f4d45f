use std::{
    fs,
    path::{Path, PathBuf},
};

use scraper::{Html, Node};
use tracing::{info, warn};

use crate::{error::CorpusError, vectorizer::corpus::Document};

/// Column holding the document id in a course table
pub const COURSE_NAME: &str = "course_name";
/// Column holding the document text in a course table
pub const COURSE_DESCRIPTION: &str = "course_description";

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Where a corpus comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusSource {
    /// every `*.html` file directly inside the directory
    HtmlDir(PathBuf),
    /// csv with `course_name` and `course_description` columns
    CourseTable(PathBuf),
}

impl CorpusSource {
    /// Read the whole source into memory
    pub fn load(&self) -> Result<Vec<Document>, CorpusError> {
        match self {
            CorpusSource::HtmlDir(dir) => load_html_dir(dir),
            CorpusSource::CourseTable(path) => load_course_table(path),
        }
    }
}

/// Visible text of an html document, whitespace collapsed
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        for word in text.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}

/// Load every `*.html` file directly inside `dir`
///
/// Files are sorted by name so the corpus order is stable; the id is the
/// file name.
pub fn load_html_dir(dir: &Path) -> Result<Vec<Document>, CorpusError> {
    let io_err = |source| CorpusError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read_to_string(&path).map_err(|source| CorpusError::Io {
            path: path.clone(),
            source,
        })?;
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(Document::new(id, html_to_text(&raw)));
    }
    if documents.is_empty() {
        return Err(CorpusError::NoDocuments(dir.to_path_buf()));
    }
    info!(dir = %dir.display(), docs = documents.len(), "loaded html corpus");
    Ok(documents)
}

/// Load a course table
///
/// Needs `course_name` and `course_description` headers; other columns are
/// ignored. Rows with an empty name are skipped.
pub fn load_course_table(path: &Path) -> Result<Vec<Document>, CorpusError> {
    let file = fs::File::open(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_course_table(file, path)
}

fn read_course_table<R: std::io::Read>(reader: R, path: &Path) -> Result<Vec<Document>, CorpusError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(CorpusError::MissingColumn(name))
    };
    let name_col = column(COURSE_NAME)?;
    let desc_col = column(COURSE_DESCRIPTION)?;

    let mut documents = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let name = record.get(name_col).unwrap_or_default().trim();
        if name.is_empty() {
            warn!(row = line + 1, "skipping course row without a name");
            continue;
        }
        let description = record.get(desc_col).unwrap_or_default();
        documents.push(Document::new(name, description));
    }
    if documents.is_empty() {
        return Err(CorpusError::NoDocuments(path.to_path_buf()));
    }
    info!(table = %path.display(), docs = documents.len(), "loaded course table");
    Ok(documents)
}
