//! Raw article batch files.
//!
//! The crawler appends one file per non-empty batch; nothing ever rewrites
//! or deletes them. Downstream stages rebuild their outputs from scratch by
//! scanning every file that matches the naming convention:
//!
//! ```text
//! stock_news_batch_<n>_<YYYYMMDD_HHMMSS>.json
//! ```
//!
//! # Scan order
//!
//! Files are read in lexicographic file-name order, so `batch_10_…` sorts
//! before `batch_2_…`. "First occurrence" during deduplication refers to
//! this order.

use crate::error::Result;
use crate::models::ArticleRecord;
use crate::utils::file_timestamp;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

static BATCH_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^stock_news_batch_.*\.json$").expect("static regex compiles"));

/// File name for batch `batch_number` written at `stamp`.
pub fn batch_file_name(batch_number: usize, stamp: &str) -> String {
    format!("stock_news_batch_{batch_number}_{stamp}.json")
}

pub fn is_batch_file_name(name: &str) -> bool {
    BATCH_FILE_RE.is_match(name)
}

/// Writes batches under the data directory.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    dir: PathBuf,
}

impl BatchWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Serialize `articles` as pretty JSON and return the written path.
    #[instrument(
        level = "info",
        skip_all,
        fields(dir = %self.dir.display(), batch_number = batch_number, count = articles.len())
    )]
    pub async fn write(&self, articles: &[ArticleRecord], batch_number: usize) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(batch_file_name(batch_number, &file_timestamp(Local::now())));
        let json = serde_json::to_string_pretty(articles)?;
        fs::write(&path, json).await?;
        info!(path = %path.display(), "Wrote batch file");
        Ok(path)
    }
}

/// Batch files in `dir`, sorted by file name. A missing directory has none.
pub async fn list_batch_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_batch_file_name);
        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one batch file.
///
/// A batch file holds an array of records; a lone object is read as a batch
/// of one. Records are converted one at a time, so an element with the wrong
/// shape is logged and dropped without losing the rest of the file.
///
/// # Arguments
///
/// * `path` - The batch file to read
///
/// # Returns
///
/// Every record in the file that could be decoded, in file order.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid JSON at all.
pub async fn load_batch_file(path: &Path) -> Result<Vec<ArticleRecord>> {
    let raw = fs::read_to_string(path).await?;
    let elements = match serde_json::from_str::<Value>(&raw)? {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut records = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<ArticleRecord>(element) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), index, error = %e, "Skipping malformed record");
            }
        }
    }
    Ok(records)
}

/// Every record from every batch file in `dir`.
///
/// A file that cannot be read or parsed is logged and skipped.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn load_all(dir: &Path) -> Vec<ArticleRecord> {
    let files = match list_batch_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            error!(error = %e, "Failed to list batch files");
            return Vec::new();
        }
    };
    info!(count = files.len(), "Found batch files to process");

    let mut all = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match load_batch_file(&path).await {
            Ok(records) => {
                info!(file = %name, count = records.len(), "Loaded articles");
                all.extend(records);
            }
            Err(e) => error!(file = %name, error = %e, "Error loading batch file; skipping"),
        }
    }
    all
}
