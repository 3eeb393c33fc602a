//! Summary statistics output.
//!
//! One pretty-printed JSON file per processing run:
//!
//! ```text
//! processed_data/
//! └── summary_stats_20240305_150000.json
//! ```

use crate::error::Result;
use crate::models::SummaryStats;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `summary_stats_<stamp>.json` under `dir`.
///
/// # Arguments
///
/// * `dir` - Processed-output directory, created if missing
/// * `stats` - Aggregates for the current run
/// * `stamp` - `YYYYMMDD_HHMMSS` run stamp, shared with the TSV export
///
/// # Returns
///
/// The path of the written file. Serialization and IO failures are
/// returned as errors.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_stats(dir: &Path, stats: &SummaryStats, stamp: &str) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(stats)?;

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(error = %e, "Failed to create stats dir");
        return Err(e.into());
    }

    let path = dir.join(format!("summary_stats_{stamp}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Saved summary statistics");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_write_stats() {
        let dir = tempfile::tempdir().unwrap();
        let stats = SummaryStats {
            total_articles: 3,
            unique_sources: 2,
            date_range: "2024-03-01 to 2024-03-05".to_string(),
            articles_with_images: 0,
            articles_with_authors: 1,
            top_sources: vec![("Reuters".to_string(), 2), ("CNBC".to_string(), 1)],
            articles_by_date: BTreeMap::from([("2024-03-01".to_string(), 3)]),
        };

        let path = write_stats(dir.path(), &stats, "20240305_150000").await.unwrap();
        assert!(path.ends_with("summary_stats_20240305_150000.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["unique_sources"], 2);
        assert_eq!(value["date_range"], "2024-03-01 to 2024-03-05");
        assert_eq!(value["top_sources"]["CNBC"], 1);
        assert_eq!(value["articles_by_date"]["2024-03-01"], 3);
    }
}
