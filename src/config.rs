use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{source::CorpusSource, store::IndexStore, vectorizer::evaluate::matcher::DEFAULT_THRESHOLD};

/// Prefix for environment overrides, e.g. `CORPUS_MATCH_OPENAI_API_KEY`
pub const ENV_PREFIX: &str = "CORPUS_MATCH";

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct AppConfig {
    /// directory of `*.html` documents
    #[serde(default)]
    pub html_dir: Option<PathBuf>,
    /// course table csv, used when `html_dir` is unset
    #[serde(default)]
    pub course_table: Option<PathBuf>,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_vectorizer_path")]
    pub vectorizer_path: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub claude_api_key: Option<String>,
    #[serde(default)]
    pub weather_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_claude_base_url")]
    pub claude_base_url: String,
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("vector_db.index")
}

fn default_vectorizer_path() -> PathBuf {
    PathBuf::from("vectorizer.cbor")
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_max_context_chars() -> usize {
    3000
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_claude_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

impl AppConfig {
    /// Corpus source to fit from, html directory first
    pub fn corpus_source(&self) -> Option<CorpusSource> {
        self.html_dir
            .clone()
            .map(CorpusSource::HtmlDir)
            .or_else(|| self.course_table.clone().map(CorpusSource::CourseTable))
    }

    pub fn index_store(&self) -> IndexStore {
        IndexStore::new(&self.index_path, &self.vectorizer_path)
    }
}

/// Load `corpus-match.toml` (optional) overlaid with `CORPUS_MATCH_*` env vars
pub fn get_config() -> Result<AppConfig, ConfigError> {
    get_config_from("corpus-match")
}

/// Same as [`get_config`] with an explicit file stem
pub fn get_config_from(file: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("absent");
        let config = get_config_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.index_path, PathBuf::from("vector_db.index"));
        assert_eq!(config.max_context_chars, 3000);
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "threshold = 0.25\ncourse_table = \"courses.csv\"\nclaude_api_key = \"k\"\n",
        )
        .unwrap();
        let stem = dir.path().join("settings");
        let config = get_config_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.claude_api_key.as_deref(), Some("k"));
        assert_eq!(
            config.corpus_source(),
            Some(CorpusSource::CourseTable(PathBuf::from("courses.csv")))
        );
    }
}
