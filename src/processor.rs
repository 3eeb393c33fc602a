//! Normalization of raw batches into a deduplicated table.
//!
//! # Stages
//!
//! 1. [`load_all`](crate::outputs::batch::load_all): every record from every batch file
//! 2. [`normalize`]: per-record cleanup and derived fields (pure)
//! 3. [`dedupe`]: typed table, first occurrence of each URL wins
//! 4. [`summarize`]: aggregate statistics
//!
//! [`Processor::process_all`] runs all four and writes a TSV export plus a
//! JSON statistics file, both stamped with the run time.

use crate::config::Config;
use crate::error::Result;
use crate::models::{ArticleRecord, ArticleRow, NormalizedArticle, SummaryStats};
use crate::outputs::{batch, json, tsv};
use crate::utils::{
    TIMESTAMP_FORMAT, collapse_whitespace, count_words, date_only, extract_domain,
    file_timestamp, normalize_datetime,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Number of sources listed in `top_sources`.
const TOP_SOURCES: usize = 5;
/// Number of earliest dates listed in `articles_by_date`.
const DATE_BUCKETS: usize = 10;

/// Clean one raw record and derive its extra fields.
pub fn normalize_article(article: &ArticleRecord) -> NormalizedArticle {
    let raw = |v: &Option<String>| v.clone().unwrap_or_default();
    let published_at = article.published_at.as_deref().unwrap_or("");
    let scraped_at = article.scraped_at.as_deref().unwrap_or("");

    NormalizedArticle {
        title: collapse_whitespace(article.title.as_deref()),
        description: collapse_whitespace(article.description.as_deref()),
        url: article.url.clone(),
        source: raw(&article.source),
        published_at: normalize_datetime(published_at).unwrap_or_else(|| published_at.to_string()),
        author: collapse_whitespace(article.author.as_deref()),
        image_url: raw(&article.image_url),
        scraped_at: normalize_datetime(scraped_at).unwrap_or_else(|| scraped_at.to_string()),
        date_range: raw(&article.date_range),
        has_image: article.image_url.as_deref().is_some_and(|s| !s.is_empty()),
        has_author: article.author.as_deref().is_some_and(|s| !s.is_empty()),
        domain: extract_domain(&article.url),
        published_date: date_only(published_at),
        scraped_date: date_only(scraped_at),
        word_count: count_words(article.description.as_deref()),
    }
}

pub fn normalize(articles: &[ArticleRecord]) -> Vec<NormalizedArticle> {
    info!(count = articles.len(), "Normalizing articles");
    articles.iter().map(normalize_article).collect()
}

/// The deduplicated table and how many rows were dropped to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleTable {
    pub rows: Vec<ArticleRow>,
    pub duplicates_removed: usize,
}

fn coerce_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

fn to_row(article: NormalizedArticle) -> ArticleRow {
    ArticleRow {
        published_at: coerce_timestamp(&article.published_at),
        scraped_at: coerce_timestamp(&article.scraped_at),
        title: article.title,
        description: article.description,
        url: article.url,
        source: article.source,
        author: article.author,
        image_url: article.image_url,
        date_range: article.date_range,
        has_image: article.has_image,
        has_author: article.has_author,
        domain: article.domain,
        published_date: article.published_date,
        scraped_date: article.scraped_date,
        word_count: article.word_count,
    }
}

/// Build the typed table, keeping only the first record for each URL.
pub fn dedupe(articles: Vec<NormalizedArticle>) -> ArticleTable {
    let original = articles.len();
    let rows: Vec<ArticleRow> = articles
        .into_iter()
        .unique_by(|a| a.url.clone())
        .map(to_row)
        .collect();
    let duplicates_removed = original - rows.len();
    if duplicates_removed > 0 {
        info!(removed = duplicates_removed, "Removed duplicate articles");
    }
    ArticleTable { rows, duplicates_removed }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Aggregate statistics over a deduplicated table.
///
/// # Returns
///
/// A [`SummaryStats`] where:
/// - `top_sources` holds the five most frequent sources, ties broken by name
/// - `date_range` spans the earliest and latest published dates, with
///   `unknown` for a missing end
/// - `articles_by_date` covers the ten earliest published dates
///
/// A blank source name counts as a source of its own.
pub fn summarize(table: &ArticleTable) -> SummaryStats {
    let rows = &table.rows;

    let mut source_counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *source_counts.entry(row.source.as_str()).or_default() += 1;
    }
    let top_sources = source_counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .take(TOP_SOURCES)
        .map(|(name, count)| (name.to_string(), *count))
        .collect();

    let mut by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in rows.iter().filter_map(|r| r.published_date) {
        *by_date.entry(date).or_default() += 1;
    }
    let first = by_date.keys().next().copied();
    let last = by_date.keys().next_back().copied();

    SummaryStats {
        total_articles: rows.len(),
        unique_sources: source_counts.len(),
        date_range: format!("{} to {}", format_date(first), format_date(last)),
        articles_with_images: rows.iter().filter(|r| r.has_image).count(),
        articles_with_authors: rows.iter().filter(|r| r.has_author).count(),
        top_sources,
        articles_by_date: by_date
            .into_iter()
            .take(DATE_BUCKETS)
            .map(|(d, n)| (d.format("%Y-%m-%d").to_string(), n))
            .collect(),
    }
}

/// Output of a processing run.
#[derive(Debug)]
pub struct ProcessedOutput {
    pub table: ArticleTable,
    pub stats: SummaryStats,
    pub tsv_path: PathBuf,
    pub stats_path: PathBuf,
}

pub struct Processor<'a> {
    config: &'a Config,
}

impl<'a> Processor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Load, normalize, dedupe, summarize, and write both outputs.
    ///
    /// Returns `Ok(None)` without writing anything when there are no articles.
    #[instrument(level = "info", skip_all, fields(data_path = %self.config.data_path.display()))]
    pub async fn process_all(&self) -> Result<Option<ProcessedOutput>> {
        info!("Starting data processing");
        let articles = batch::load_all(&self.config.data_path).await;
        if articles.is_empty() {
            warn!("No articles found to process");
            return Ok(None);
        }

        let table = dedupe(normalize(&articles));
        let stats = summarize(&table);

        let stamp = file_timestamp(Local::now());
        let out_dir = &self.config.processed_data_path;
        let tsv_path = tsv::write_table(out_dir, &table.rows, &stamp).await?;
        let stats_path = json::write_stats(out_dir, &stats, &stamp).await?;

        info!(
            total = stats.total_articles,
            unique_sources = stats.unique_sources,
            date_range = %stats.date_range,
            tsv = %tsv_path.display(),
            stats = %stats_path.display(),
            "Processing completed"
        );
        Ok(Some(ProcessedOutput { table, stats, tsv_path, stats_path }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn raw(url: &str, title: &str) -> ArticleRecord {
        ArticleRecord {
            title: Some(title.to_string()),
            description: Some("  Shares   rose\nsharply ".to_string()),
            url: url.to_string(),
            source: Some("Reuters".to_string()),
            published_at: Some("2024-03-05T14:30:00Z".to_string()),
            author: Some("Jane  Doe".to_string()),
            image_url: Some(String::new()),
            scraped_at: Some("2024-03-06T08:00:00.123456".to_string()),
            date_range: Some("2024-02-28_to_2024-03-06".to_string()),
        }
    }

    #[test]
    fn test_normalize_article_derives_fields() {
        let n = normalize_article(&raw("https://www.reuters.com/article/x", " Stocks \t up "));
        assert_eq!(n.title, "Stocks up");
        assert_eq!(n.description, "Shares rose sharply");
        assert_eq!(n.author, "Jane Doe");
        assert_eq!(n.published_at, "2024-03-05 14:30:00");
        assert_eq!(n.scraped_at, "2024-03-06 08:00:00");
        assert_eq!(n.domain, "www.reuters.com");
        assert_eq!(n.published_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(n.scraped_date, NaiveDate::from_ymd_opt(2024, 3, 6));
        assert_eq!(n.word_count, 3);
        assert!(!n.has_image);
        assert!(n.has_author);
    }

    #[test]
    fn test_unparsable_timestamp_passes_through() {
        let mut article = raw("https://a.com/1", "T");
        article.published_at = Some("last Tuesday".to_string());
        let n = normalize_article(&article);
        assert_eq!(n.published_at, "last Tuesday");
        assert_eq!(n.published_date, None);

        let table = dedupe(vec![n]);
        assert_eq!(table.rows[0].published_at, None);
    }

    #[test]
    fn test_missing_fields_normalize_to_empty() {
        let article = ArticleRecord {
            url: String::new(),
            ..Default::default()
        };
        let n = normalize_article(&article);
        assert_eq!(n.title, "");
        assert_eq!(n.domain, "");
        assert_eq!(n.word_count, 0);
        assert!(!n.has_image && !n.has_author);
        assert_eq!(n.published_date, None);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let batch = vec![raw("https://a.com/1", "One"), raw("https://a.com/2", "Two")];
        let first = normalize(&batch);
        let second = normalize(&batch);
        assert_eq!(first, second);
        let reversed: Vec<_> = batch.iter().rev().cloned().collect();
        let mut again = normalize(&reversed);
        again.reverse();
        assert_eq!(first, again);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let table = dedupe(normalize(&[
            raw("https://x.com/a", "T1"),
            raw("https://x.com/b", "Other"),
            raw("https://x.com/a", "T2"),
        ]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.duplicates_removed, 1);
        let row = table.rows.iter().find(|r| r.url == "https://x.com/a").unwrap();
        assert_eq!(row.title, "T1");
    }

    #[test]
    fn test_summarize() {
        let mut articles = Vec::new();
        for (i, (source, date)) in [
            ("Reuters", "2024-03-05T10:00:00Z"),
            ("Reuters", "2024-03-05T11:00:00Z"),
            ("Bloomberg", "2024-03-01T09:00:00Z"),
            ("CNBC", "bad date"),
        ]
        .iter()
        .enumerate()
        {
            let mut a = raw(&format!("https://a.com/{i}"), "t");
            a.source = Some(source.to_string());
            a.published_at = Some(date.to_string());
            a.image_url = Some(if i == 0 {
                "https://img/1.png".to_string()
            } else {
                String::new()
            });
            articles.push(a);
        }
        let stats = summarize(&dedupe(normalize(&articles)));

        assert_eq!(stats.total_articles, 4);
        assert_eq!(stats.unique_sources, 3);
        assert_eq!(stats.date_range, "2024-03-01 to 2024-03-05");
        assert_eq!(stats.articles_with_images, 1);
        assert_eq!(stats.articles_with_authors, 4);
        assert_eq!(stats.top_sources[0], ("Reuters".to_string(), 2));
        assert_eq!(stats.top_sources[1], ("Bloomberg".to_string(), 1));
        assert_eq!(stats.articles_by_date.get("2024-03-05"), Some(&2));
        assert_eq!(stats.articles_by_date.get("2024-03-01"), Some(&1));
    }

    #[test]
    fn test_summarize_counts_blank_source_as_a_source() {
        let mut articles = Vec::new();
        for (i, source) in ["", "", "Reuters"].iter().enumerate() {
            let mut a = raw(&format!("https://a.com/{i}"), "t");
            a.source = Some(source.to_string());
            articles.push(a);
        }
        let mut unnamed = raw("https://a.com/3", "t");
        unnamed.source = None;
        articles.push(unnamed);

        let stats = summarize(&dedupe(normalize(&articles)));
        assert_eq!(stats.unique_sources, 2);
        assert_eq!(stats.top_sources[0], (String::new(), 3));
        assert_eq!(stats.top_sources[1], ("Reuters".to_string(), 1));
    }

    #[test]
    fn test_summarize_limits_dates_to_earliest_ten() {
        let articles: Vec<_> = (1..=12)
            .map(|day| {
                let mut a = raw(&format!("https://a.com/{day}"), "t");
                a.published_at = Some(format!("2024-01-{day:02} 12:00:00"));
                a
            })
            .collect();
        let stats = summarize(&dedupe(normalize(&articles)));
        assert_eq!(stats.articles_by_date.len(), 10);
        assert!(stats.articles_by_date.contains_key("2024-01-01"));
        assert!(!stats.articles_by_date.contains_key("2024-01-11"));
        assert_eq!(stats.date_range, "2024-01-01 to 2024-01-12");
    }

    #[tokio::test]
    async fn test_process_all_with_no_batches_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let out = Processor::new(&config).process_all().await.unwrap();
        assert!(out.is_none());
        assert!(!config.processed_data_path.exists());
    }

    #[tokio::test]
    async fn test_process_all_writes_tsv_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.data_path).unwrap();
        std::fs::write(
            config.data_path.join("stock_news_batch_1_20240306_080000.json"),
            serde_json::to_string(&vec![
                raw("https://a.com/1", "One"),
                raw("https://a.com/1", "Dup"),
            ])
            .unwrap(),
        )
        .unwrap();

        let out = Processor::new(&config).process_all().await.unwrap().unwrap();
        assert_eq!(out.stats.total_articles, 1);
        assert!(out.tsv_path.starts_with(&config.processed_data_path));

        let tsv = std::fs::read_to_string(&out.tsv_path).unwrap();
        assert_eq!(tsv.lines().count(), 2);
        assert!(tsv.lines().nth(1).unwrap().starts_with("One\t"));

        let stats: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out.stats_path).unwrap()).unwrap();
        assert_eq!(stats["total_articles"], 1);
        assert_eq!(stats["top_sources"]["Reuters"], 1);
    }
}
