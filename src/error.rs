//! Crate-wide error type.
//!
//! Every operation that touches the network or the filesystem returns
//! [`Result`]. Callers decide whether a failure is logged and skipped (a bad
//! batch file, a failed request) or propagated (configuration problems).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("News API returned an error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
