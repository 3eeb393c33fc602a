//! SQL script generation from raw batches.
//!
//! Values are embedded as literals: text is whitespace-collapsed and single
//! quotes are doubled. That is the only escaping applied, so the output is
//! meant for loading trusted batch data, not for building queries from
//! arbitrary input.
//!
//! # Files per run
//!
//! | File | Contents |
//! |------|----------|
//! | `create_table_<ts>.sql` | `CREATE TABLE IF NOT EXISTS` plus four indexes |
//! | `insert_articles_<ts>.sql` | Bulk insert, `ON CONFLICT (url) DO NOTHING` |
//! | `upsert_articles_<ts>.sql` | Bulk insert, `ON CONFLICT (url) DO UPDATE` |
//! | `complete_sql_<ts>.sql` | Header comment, table DDL, and the plain insert |

use crate::config::Config;
use crate::error::Result;
use crate::models::{ArticleRecord, SqlArticle, SqlValue};
use crate::outputs::batch;
use crate::utils::{count_words, extract_domain, file_timestamp, normalize_datetime};
use chrono::Local;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Insert column order; must match [`SqlArticle::values`].
pub const INSERT_COLUMNS: [&str; 12] = [
    "url",
    "title",
    "description",
    "source",
    "author",
    "published_at",
    "scraped_at",
    "image_url",
    "domain",
    "word_count",
    "has_image",
    "has_author",
];

/// Collapse whitespace and double single quotes. Blank input is `None`.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let text = text?;
    if text.trim().is_empty() {
        return None;
    }
    Some(text.split_whitespace().collect::<Vec<_>>().join(" ").replace('\'', "''"))
}

/// Render one value as an SQL literal.
pub fn escape_sql_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) if s.is_empty() => "NULL".to_string(),
        SqlValue::Text(s) => format!("'{s}'"),
        SqlValue::Int(n) => n.to_string(),
        SqlValue::Bool(true) => "TRUE".to_string(),
        SqlValue::Bool(false) => "FALSE".to_string(),
    }
}

/// Prepare one raw article for literal embedding.
///
/// Unparsable timestamps become `NULL` rather than an invalid literal.
pub fn transform_article(article: &ArticleRecord) -> SqlArticle {
    let domain = extract_domain(&article.url);
    SqlArticle {
        url: clean_text(Some(&article.url)),
        title: clean_text(article.title.as_deref()),
        description: clean_text(article.description.as_deref()),
        source: clean_text(article.source.as_deref()),
        author: clean_text(article.author.as_deref()),
        published_at: article.published_at.as_deref().and_then(normalize_datetime),
        scraped_at: article.scraped_at.as_deref().and_then(normalize_datetime),
        image_url: clean_text(article.image_url.as_deref()),
        domain: clean_text(Some(&domain)),
        word_count: count_words(article.description.as_deref()),
        has_image: article.image_url.as_deref().is_some_and(|s| !s.is_empty()),
        has_author: article.author.as_deref().is_some_and(|s| !s.is_empty()),
    }
}

/// Idempotent table and index definitions.
///
/// # Arguments
///
/// * `table` - Table name, used verbatim in the DDL and in every index name
///
/// # Returns
///
/// A `CREATE TABLE IF NOT EXISTS` statement followed by a unique index on
/// `url` and plain indexes on `source`, `published_at`, and `domain`.
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id SERIAL PRIMARY KEY,
    url TEXT UNIQUE NOT NULL,
    title TEXT,
    description TEXT,
    source VARCHAR(255),
    author VARCHAR(255),
    published_at TIMESTAMP,
    scraped_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    image_url TEXT,
    domain VARCHAR(255),
    word_count INTEGER DEFAULT 0,
    has_image BOOLEAN DEFAULT FALSE,
    has_author BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_url ON {table}(url);
CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
CREATE INDEX IF NOT EXISTS idx_{table}_published_at ON {table}(published_at);
CREATE INDEX IF NOT EXISTS idx_{table}_domain ON {table}(domain);
"#
    )
}

/// Transformed rows that can go into one statement.
///
/// `url` is the conflict key, so a row without one is dropped and a repeated
/// URL keeps only its first occurrence. Postgres rejects a whole
/// `ON CONFLICT DO UPDATE` statement that touches the same row twice.
fn loadable_rows(articles: &[ArticleRecord]) -> Vec<SqlArticle> {
    let rows: Vec<SqlArticle> = articles
        .iter()
        .map(transform_article)
        .filter(|row| row.url.is_some())
        .unique_by(|row| row.url.clone())
        .collect();
    if rows.len() < articles.len() {
        info!(
            skipped = articles.len() - rows.len(),
            "Dropped rows with a missing or repeated url"
        );
    }
    rows
}

fn insert_head_and_rows(table: &str, rows: &[SqlArticle]) -> String {
    let tuples = rows
        .iter()
        .map(|row| {
            let values = row
                .values()
                .iter()
                .map(escape_sql_value)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({values})")
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "INSERT INTO {table} ({}) VALUES\n{tuples}",
        INSERT_COLUMNS.join(", ")
    )
}

/// Bulk insert that skips rows whose URL already exists.
///
/// # Arguments
///
/// * `table` - Target table name
/// * `articles` - Raw articles in load order; the first article for a URL wins
///
/// # Returns
///
/// One `INSERT ... ON CONFLICT (url) DO NOTHING;` statement, or an empty
/// string when no article has a URL.
pub fn insert_sql(table: &str, articles: &[ArticleRecord]) -> String {
    let rows = loadable_rows(articles);
    if rows.is_empty() {
        return String::new();
    }
    format!(
        "{}\nON CONFLICT (url) DO NOTHING;",
        insert_head_and_rows(table, &rows)
    )
}

/// Bulk insert that overwrites every non-key column on URL conflict.
///
/// Input handling matches [`insert_sql`]; `updated_at` is reset to the
/// current time on every updated row.
pub fn upsert_sql(table: &str, articles: &[ArticleRecord]) -> String {
    let rows = loadable_rows(articles);
    if rows.is_empty() {
        return String::new();
    }
    let updates = INSERT_COLUMNS
        .iter()
        .filter(|c| **c != "url")
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\nON CONFLICT (url) DO UPDATE SET {updates}, updated_at = CURRENT_TIMESTAMP;",
        insert_head_and_rows(table, &rows)
    )
}

/// Header comment, table DDL, and the plain insert in one script.
pub fn combined_sql(create_table: &str, insert: &str, generated_at: &str) -> String {
    format!(
        "-- Complete SQL script for stock articles\n\
         -- Generated on {generated_at}\n\
         \n\
         {create_table}\n\
         \n\
         -- Insert new articles only (skip duplicates)\n\
         {insert}\n"
    )
}

/// Paths written by one SQL generation run.
#[derive(Debug, Clone)]
pub struct SqlFiles {
    pub create_table: PathBuf,
    pub insert: PathBuf,
    pub upsert: PathBuf,
    pub combined: PathBuf,
}

pub struct SqlGenerator<'a> {
    config: &'a Config,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    async fn save(&self, content: &str, filename: &str) -> Result<PathBuf> {
        let dir: &Path = &self.config.sql_path;
        fs::create_dir_all(dir).await?;
        let path = dir.join(filename);
        fs::write(&path, content).await?;
        info!(path = %path.display(), "Saved SQL");
        Ok(path)
    }

    /// Generate all four scripts from every batch file.
    ///
    /// Returns `Ok(None)` without writing anything when there are no articles.
    #[instrument(level = "info", skip_all, fields(data_path = %self.config.data_path.display()))]
    pub async fn generate_all(&self) -> Result<Option<SqlFiles>> {
        info!("Starting SQL generation");
        let articles = batch::load_all(&self.config.data_path).await;
        if articles.is_empty() {
            warn!("No articles found to process");
            return Ok(None);
        }
        info!(count = articles.len(), "Processing articles");

        let now = Local::now();
        let stamp = file_timestamp(now);
        let table = &self.config.table_name;

        let create = create_table_sql(table);
        let insert = insert_sql(table, &articles);
        let upsert = upsert_sql(table, &articles);
        let combined = combined_sql(&create, &insert, &now.format("%Y-%m-%d %H:%M:%S").to_string());

        let files = SqlFiles {
            create_table: self.save(&create, &format!("create_table_{stamp}.sql")).await?,
            insert: self.save(&insert, &format!("insert_articles_{stamp}.sql")).await?,
            upsert: self.save(&upsert, &format!("upsert_articles_{stamp}.sql")).await?,
            combined: self.save(&combined, &format!("complete_sql_{stamp}.sql")).await?,
        };
        info!(count = articles.len(), "SQL generation completed");
        Ok(Some(files))
    }
}
