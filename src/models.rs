//! Data models shared by the crawl, process, and SQL stages.
//!
//! - [`ArticleRecord`]: one article as fetched and written to a batch file
//! - [`CheckpointDocument`]: the on-disk checkpoint
//! - [`NormalizedArticle`] / [`ArticleRow`]: cleaned records and their typed table form
//! - [`SummaryStats`]: aggregates over a processed table
//! - [`SqlArticle`] / [`SqlValue`]: escaped values ready for literal embedding

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A raw article as fetched from the news API.
///
/// `url` is the deduplication key. Every other field may be null in batch
/// files written by older runs, so they are all optional here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub scraped_at: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Checkpoint file contents.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointDocument {
    #[serde(default)]
    pub collected_urls: Vec<String>,
    #[serde(default)]
    pub last_run: Option<String>,
    #[serde(default)]
    pub total_articles: usize,
}

/// An article after text cleanup and field derivation.
///
/// `published_at` and `scraped_at` hold the normalized `YYYY-MM-DD HH:MM:SS`
/// form when parsable, otherwise the original string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: String,
    pub author: String,
    pub image_url: String,
    pub scraped_at: String,
    pub date_range: String,
    pub has_image: bool,
    pub has_author: bool,
    pub domain: String,
    pub published_date: Option<NaiveDate>,
    pub scraped_date: Option<NaiveDate>,
    pub word_count: usize,
}

/// One row of the deduplicated table, with timestamp columns coerced to
/// real types. Coercion failures are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRow {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<NaiveDateTime>,
    pub author: String,
    pub image_url: String,
    pub scraped_at: Option<NaiveDateTime>,
    pub date_range: String,
    pub has_image: bool,
    pub has_author: bool,
    pub domain: String,
    pub published_date: Option<NaiveDate>,
    pub scraped_date: Option<NaiveDate>,
    pub word_count: usize,
}

/// Aggregates computed over a full processed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_articles: usize,
    pub unique_sources: usize,
    pub date_range: String,
    pub articles_with_images: usize,
    pub articles_with_authors: usize,
    /// Most frequent first; serialized as an object in that order.
    #[serde(serialize_with = "ordered_map")]
    pub top_sources: Vec<(String, usize)>,
    pub articles_by_date: BTreeMap<String, usize>,
}

fn ordered_map<S: Serializer>(pairs: &[(String, usize)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

/// A single value destined for an SQL `VALUES` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    /// Already escaped text; rendered inside single quotes.
    Text(String),
    Int(i64),
    Bool(bool),
}

/// An article transformed for literal SQL embedding.
///
/// Text fields are whitespace-collapsed with single quotes doubled; blank
/// values are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlArticle {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub scraped_at: Option<String>,
    pub image_url: Option<String>,
    pub domain: Option<String>,
    pub word_count: usize,
    pub has_image: bool,
    pub has_author: bool,
}

impl SqlArticle {
    /// Values in insert column order.
    pub fn values(&self) -> Vec<SqlValue> {
        let text = |v: &Option<String>| match v {
            Some(s) => SqlValue::Text(s.clone()),
            None => SqlValue::Null,
        };
        vec![
            text(&self.url),
            text(&self.title),
            text(&self.description),
            text(&self.source),
            text(&self.author),
            text(&self.published_at),
            text(&self.scraped_at),
            text(&self.image_url),
            text(&self.domain),
            SqlValue::Int(self.word_count as i64),
            SqlValue::Bool(self.has_image),
            SqlValue::Bool(self.has_author),
        ]
    }
}
