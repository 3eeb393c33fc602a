//! Durable set of every article URL ever collected.
//!
//! The checkpoint is a single JSON document rewritten in full after each
//! saved batch. A missing, unreadable, or malformed file is not fatal: the
//! crawl starts over with an empty set and the problem is logged.

use crate::error::Result;
use crate::models::CheckpointDocument;
use chrono::Local;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint document. `Ok(None)` when the file does not exist.
    pub async fn try_load(&self) -> Result<Option<CheckpointDocument>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// The persisted URL set, or an empty set if none can be read.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> HashSet<String> {
        match self.try_load().await {
            Ok(Some(doc)) => {
                let urls: HashSet<String> = doc.collected_urls.into_iter().collect();
                info!(count = urls.len(), "Loaded checkpoint");
                urls
            }
            Ok(None) => {
                info!("No checkpoint found; starting fresh");
                HashSet::new()
            }
            Err(e) => {
                error!(error = %e, "Error loading checkpoint; starting fresh");
                HashSet::new()
            }
        }
    }

    /// Overwrite the checkpoint with `urls`, the current time, and the count.
    ///
    /// URLs are written in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    #[instrument(
        level = "debug",
        skip_all,
        fields(path = %self.path.display(), count = urls.len())
    )]
    pub async fn save(&self, urls: &HashSet<String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut collected_urls: Vec<String> = urls.iter().cloned().collect();
        collected_urls.sort();
        let doc = CheckpointDocument {
            total_articles: collected_urls.len(),
            collected_urls,
            last_run: Some(Local::now().to_rfc3339()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?).await?;
        Ok(())
    }
}
