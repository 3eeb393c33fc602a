//! Pipeline configuration loaded from `config.yaml`.
//!
//! The configuration is read once at startup and handed by reference to each
//! stage. `query`, `api_key`, and `language` are required; a missing or blank
//! value is a fatal startup error. Everything else has a default.

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Hard page-size ceiling imposed by the news provider.
pub const PROVIDER_MAX_PAGE_SIZE: u32 = 100;

/// Settings shared by the crawl, process, and SQL stages.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding raw batch files and the checkpoint.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Directory for the TSV export and summary statistics.
    #[serde(default = "default_processed_data_path")]
    pub processed_data_path: PathBuf,
    /// Directory for generated `.sql` files.
    #[serde(default = "default_sql_path")]
    pub sql_path: PathBuf,
    /// Checkpoint file name, resolved inside `data_path`.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
    pub query: String,
    pub language: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    #[serde(default = "default_max_total_articles")]
    pub max_total_articles: usize,
    /// Flat pause between consecutive API requests.
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: u64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Alternate queries tried after the configured one to widen coverage.
    #[serde(default = "default_search_strategies")]
    pub search_strategies: Vec<String>,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_processed_data_path() -> PathBuf {
    PathBuf::from("processed_data")
}

fn default_sql_path() -> PathBuf {
    PathBuf::from("sql")
}

fn default_checkpoint_file() -> String {
    "checkpoint.json".to_string()
}

fn default_batch_size() -> u32 {
    20
}

fn default_days_back() -> u32 {
    7
}

fn default_max_total_articles() -> usize {
    1000
}

fn default_request_delay_secs() -> u64 {
    2
}

fn default_api_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_table_name() -> String {
    "stock_articles".to_string()
}

fn default_search_strategies() -> Vec<String> {
    [
        "stock market news",
        "financial news",
        "investment news",
        "market analysis",
        "economic news",
        "trading news",
        "business news",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Load and validate the configuration at `path`.
    ///
    /// `api_key_override` (from the CLI or environment) replaces whatever
    /// the file holds for `api_key`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, api_key_override: Option<&str>) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&raw)?;
        if let Some(key) = api_key_override {
            config.api_key = key.to_string();
        }
        config.validate()?;
        info!(query = %config.query, language = %config.language, "Loaded configuration");
        Ok(config)
    }

    /// Parse YAML without validating required values.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reject blank required keys.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("query", &self.query),
            ("api_key", &self.api_key),
            ("language", &self.language),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "required key `{key}` is missing or empty"
                )));
            }
        }
        Ok(())
    }

    /// Full path to the checkpoint file.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_path.join(&self.checkpoint_file)
    }

    /// Page size sent to the API, capped at the provider maximum.
    pub fn page_size(&self) -> u32 {
        self.batch_size.clamp(1, PROVIDER_MAX_PAGE_SIZE)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }
}

/// A configuration rooted in `root`, with no politeness delay.
#[cfg(test)]
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::from_yaml("query: stocks\nlanguage: en\napi_key: test-key\n")
        .expect("static test config parses");
    config.data_path = root.join("data");
    config.processed_data_path = root.join("processed_data");
    config.sql_path = root.join("sql");
    config.request_delay_secs = 0;
    config
}
