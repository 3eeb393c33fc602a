//! Tab-separated export of the processed table.
//!
//! The file keeps the `.csv` extension of earlier exports but uses a tab
//! separator. Fields holding a tab, line break, or double quote are wrapped
//! in double quotes with inner quotes doubled; null values are empty.

use crate::error::Result;
use crate::models::ArticleRow;
use crate::utils::TIMESTAMP_FORMAT;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const COLUMNS: [&str; 15] = [
    "title",
    "description",
    "url",
    "source",
    "published_at",
    "author",
    "image_url",
    "scraped_at",
    "date_range",
    "has_image",
    "has_author",
    "domain",
    "published_date",
    "scraped_date",
    "word_count",
];

fn escape_field(value: &str) -> String {
    if value.contains(['\t', '\n', '\r', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn timestamp(value: Option<NaiveDateTime>) -> String {
    value.map(|v| v.format(TIMESTAMP_FORMAT).to_string()).unwrap_or_default()
}

fn date(value: Option<NaiveDate>) -> String {
    value.map(|v| v.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn flag(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

/// Render `rows` with a header line.
pub fn render(rows: &[ArticleRow]) -> String {
    let mut out = String::new();
    out.push_str(&COLUMNS.join("\t"));
    out.push('\n');
    for row in rows {
        let fields = [
            row.title.clone(),
            row.description.clone(),
            row.url.clone(),
            row.source.clone(),
            timestamp(row.published_at),
            row.author.clone(),
            row.image_url.clone(),
            timestamp(row.scraped_at),
            row.date_range.clone(),
            flag(row.has_image),
            flag(row.has_author),
            row.domain.clone(),
            date(row.published_date),
            date(row.scraped_date),
            row.word_count.to_string(),
        ];
        let line = fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join("\t");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Write `stock_news_processed_<stamp>.csv` under `dir`.
///
/// # Arguments
///
/// * `dir` - Processed-output directory, created if missing
/// * `rows` - The deduplicated table
/// * `stamp` - `YYYYMMDD_HHMMSS` run stamp
///
/// # Returns
///
/// The path of the written file.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created or the file
/// cannot be written.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), rows = rows.len()))]
pub async fn write_table(dir: &Path, rows: &[ArticleRow], stamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("stock_news_processed_{stamp}.csv"));
    fs::write(&path, render(rows)).await?;
    info!(path = %path.display(), "Saved processed data");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ArticleRow {
        ArticleRow {
            title: "Fed holds \"steady\"".to_string(),
            description: "Rates unchanged".to_string(),
            url: "https://a.com/1".to_string(),
            source: "Reuters".to_string(),
            published_at: NaiveDateTime::parse_from_str("2024-03-05 14:30:00", TIMESTAMP_FORMAT)
                .ok(),
            author: String::new(),
            image_url: String::new(),
            scraped_at: None,
            date_range: "2024-02-28_to_2024-03-06".to_string(),
            has_image: false,
            has_author: true,
            domain: "a.com".to_string(),
            published_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            scraped_date: None,
            word_count: 2,
        }
    }

    #[test]
    fn test_render_header_and_row() {
        let out = render(&[row()]);
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap().split('\t').count(), 15);
        let fields: Vec<_> = lines.next().unwrap().split('\t').collect();
        assert_eq!(fields[0], "\"Fed holds \"\"steady\"\"\"");
        assert_eq!(fields[4], "2024-03-05 14:30:00");
        assert_eq!(fields[7], "");
        assert_eq!(fields[9], "False");
        assert_eq!(fields[10], "True");
        assert_eq!(fields[12], "2024-03-05");
        assert_eq!(fields[14], "2");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a\tb"), "\"a\tb\"");
    }

    #[tokio::test]
    async fn test_write_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(&dir.path().join("out"), &[row()], "20240305_150000").await.unwrap();
        assert!(path.ends_with("stock_news_processed_20240305_150000.csv"));
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
    }
}
