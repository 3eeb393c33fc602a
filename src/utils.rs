//! Helpers for text cleanup, timestamp parsing, and file system checks.
//!
//! The normalizer and the SQL emitter derive the same fields from a raw
//! article, so the shared transforms live here:
//! - Whitespace collapsing for text fields
//! - Timestamp parsing in the two forms the pipeline produces and receives
//! - Domain extraction and description word counts
//! - Timestamped file names and output directory validation

use crate::error::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

/// Output format for normalized timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// Blank or missing input yields an empty string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace(Some("  a \n b  ")), "a b");
/// assert_eq!(collapse_whitespace(None), "");
/// ```
pub fn collapse_whitespace(text: Option<&str>) -> String {
    match text {
        Some(t) => t.split_whitespace().collect::<Vec<_>>().join(" "),
        None => String::new(),
    }
}

/// Parse a timestamp in either ISO-8601 form or `YYYY-MM-DD HH:MM:SS`.
///
/// Values containing a `T` are treated as ISO-8601 with optional fractional
/// seconds. The offset may be `Z`, `+00:00`, or `+0000`; offset-bearing
/// values keep their wall-clock time in the stated offset.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if value.is_empty() {
        return None;
    }
    if value.contains('T') {
        let with_offset = DateTime::parse_from_rfc3339(value)
            .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"));
        if let Ok(dt) = with_offset {
            return Some(dt.naive_local());
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    } else {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
    }
}

/// Reformat a timestamp as `YYYY-MM-DD HH:MM:SS`, or `None` if unparsable.
pub fn normalize_datetime(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// The calendar date of a timestamp, or `None` if unparsable.
pub fn date_only(value: &str) -> Option<NaiveDate> {
    parse_timestamp(value).map(|dt| dt.date())
}

/// Host (and explicit port) of a URL; empty for blank or malformed input.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(extract_domain("https://www.reuters.com/article/x"), "www.reuters.com");
/// assert_eq!(extract_domain("not a url"), "");
/// ```
pub fn extract_domain(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Number of whitespace-separated tokens.
pub fn count_words(text: Option<&str>) -> usize {
    text.map(|t| t.split_whitespace().count()).unwrap_or(0)
}

/// `YYYYMMDD_HHMMSS` stamp used in output file names.
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary)
/// with `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Name of the scratch file used to check that an output directory accepts writes.
const WRITE_PROBE: &str = ".stock_news_write_probe";

/// Create `path` if needed and confirm that files can be written into it.
///
/// # Arguments
///
/// * `path` - Output directory the stage is about to write into
///
/// # Errors
///
/// Returns [`PipelineError::Io`](crate::error::PipelineError::Io) if the
/// directory cannot be created or a scratch file cannot be written inside it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe = path.join(WRITE_PROBE);
    fs::write(&probe, b"").await?;
    if let Err(e) = fs::remove_file(&probe).await {
        debug!(error = %e, "Could not remove write probe");
    }
    info!("Output directory is writable");
    Ok(())
}
