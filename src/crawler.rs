//! Article collection from the news API.
//!
//! The [`Fetcher`] owns the set of URLs seen so far (seeded from the
//! checkpoint) and only ever returns articles whose URL is not already in it.
//!
//! # Collection strategy
//!
//! [`Fetcher::run`] makes three passes, stopping once `max_total_articles`
//! new articles have been collected:
//!
//! 1. The configured query over the most recent `days_back` days
//! 2. Each alternate search strategy over the same window
//! 3. The configured query over windows shifted 1..=`days_back` days into the past
//!
//! Every non-empty batch is written to disk and the checkpoint is flushed
//! before the next request, so a crash loses at most the batch in flight.

use crate::api::{ApiArticle, EverythingRequest, NewsSource};
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::models::ArticleRecord;
use crate::outputs::batch::BatchWriter;
use chrono::{Days, Local, NaiveDate};
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// `[today - (days_back + offset), today - offset]`.
pub fn date_window(today: NaiveDate, days_back: u32, offset: u32) -> (NaiveDate, NaiveDate) {
    let from = today
        .checked_sub_days(Days::new(u64::from(days_back) + u64::from(offset)))
        .unwrap_or(NaiveDate::MIN);
    let to = today
        .checked_sub_days(Days::new(u64::from(offset)))
        .unwrap_or(NaiveDate::MIN);
    (from, to)
}

pub struct Fetcher<'a, S> {
    config: &'a Config,
    source: S,
    checkpoint: CheckpointStore,
    writer: BatchWriter,
    collected_urls: HashSet<String>,
}

impl<'a, S: NewsSource> Fetcher<'a, S> {
    /// Build a fetcher and seed its URL set from the checkpoint.
    ///
    /// # Arguments
    ///
    /// * `config` - Query, window, cap, and path settings for the crawl
    /// * `source` - The news provider to search
    ///
    /// A missing or unreadable checkpoint is logged and treated as empty, so
    /// construction never fails.
    pub async fn new(config: &'a Config, source: S) -> Self {
        let checkpoint = CheckpointStore::new(config.checkpoint_path());
        let collected_urls = checkpoint.load().await;
        Self {
            config,
            source,
            checkpoint,
            writer: BatchWriter::new(&config.data_path),
            collected_urls,
        }
    }

    /// Fetch one page for `query` in the window shifted back by `date_offset` days.
    ///
    /// Newly accepted URLs are added to the in-memory set immediately, so a
    /// later call in the same run never returns them again.
    ///
    /// # Arguments
    ///
    /// * `query` - Search string sent as `q`
    /// * `date_offset` - Days to shift the window into the past
    ///
    /// # Returns
    ///
    /// The articles with unseen URLs and the provider's total hit count.
    /// Any request or decoding failure yields `(vec![], 0)`.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_batch(
        &mut self,
        query: &str,
        date_offset: u32,
    ) -> (Vec<ArticleRecord>, u64) {
        let today = Local::now().date_naive();
        let (from, to) = date_window(today, self.config.days_back, date_offset);
        let request = EverythingRequest {
            query: query.to_string(),
            language: self.config.language.clone(),
            page_size: self.config.page_size(),
            from,
            to,
            page: 1,
        };

        let response = match self.source.everything(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Error fetching articles");
                return (Vec::new(), 0);
            }
        };
        info!(
            %from,
            %to,
            found = response.articles.len(),
            total_available = response.total_results,
            "Fetched date range"
        );

        let date_range = format!("{from}_to_{to}");
        let mut articles = Vec::new();
        for item in response.articles {
            let url = item.url.clone().unwrap_or_default();
            if url.is_empty() || self.collected_urls.contains(&url) {
                continue;
            }
            self.collected_urls.insert(url.clone());
            articles.push(to_record(item, url, &date_range));
        }
        info!(new_articles = articles.len(), "New articles in this batch");

        (articles, response.total_results)
    }

    /// Write a batch and flush the checkpoint.
    ///
    /// If the batch cannot be written its URLs are forgotten again so a
    /// later run can collect them.
    async fn persist(&mut self, articles: &[ArticleRecord], batch_number: usize) -> bool {
        match self.writer.write(articles, batch_number).await {
            Ok(path) => {
                info!(
                    batch = batch_number,
                    count = articles.len(),
                    path = %path.display(),
                    "Saved new articles"
                );
            }
            Err(e) => {
                error!(batch = batch_number, error = %e, "Failed to write batch file");
                for article in articles {
                    self.collected_urls.remove(&article.url);
                }
                return false;
            }
        }
        if let Err(e) = self.checkpoint.save(&self.collected_urls).await {
            error!(
                error = %e,
                path = %self.checkpoint.path().display(),
                "Failed to save checkpoint"
            );
        }
        true
    }

    async fn pause(&self) {
        let delay = self.config.request_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    /// Collect new articles until the configured cap or the date window is exhausted.
    #[instrument(level = "info", skip_all, fields(query = %self.config.query))]
    pub async fn run(&mut self) -> Vec<ArticleRecord> {
        let config = self.config;
        let max_total = config.max_total_articles;
        let mut all_articles: Vec<ArticleRecord> = Vec::new();
        let mut batch_number = 1usize;

        info!(
            existing_urls = self.collected_urls.len(),
            max_total,
            batch_size = config.page_size(),
            days_back = config.days_back,
            "Starting crawl"
        );

        let (articles, _) = self.fetch_batch(&config.query, 0).await;
        if !articles.is_empty() && self.persist(&articles, batch_number).await {
            all_articles.extend(articles);
            batch_number += 1;
        }

        for strategy in &config.search_strategies {
            if all_articles.len() >= max_total {
                break;
            }
            info!(%strategy, "Trying search strategy");
            let (articles, _) = self.fetch_batch(strategy, 0).await;
            if !articles.is_empty() && self.persist(&articles, batch_number).await {
                all_articles.extend(articles);
                batch_number += 1;
            }
            self.pause().await;
        }

        let mut date_offset = 1u32;
        while all_articles.len() < max_total && date_offset <= config.days_back {
            info!(date_offset, "Fetching older articles");
            let (articles, _) = self.fetch_batch(&config.query, date_offset).await;
            date_offset += 1;

            if articles.is_empty() {
                info!("No new articles found in this date range");
                continue;
            }
            if self.persist(&articles, batch_number).await {
                all_articles.extend(articles);
                batch_number += 1;
                info!(collected = all_articles.len(), max_total, "Progress");
            }
            self.pause().await;
        }

        if all_articles.len() > max_total {
            warn!(
                collected = all_articles.len(),
                max_total,
                "Last batch overshot the article cap"
            );
        }
        info!(
            new_articles = all_articles.len(),
            checkpoint_urls = self.collected_urls.len(),
            "Crawling completed"
        );
        all_articles
    }
}

fn to_record(item: ApiArticle, url: String, date_range: &str) -> ArticleRecord {
    ArticleRecord {
        title: Some(item.title.unwrap_or_default()),
        description: Some(item.description.unwrap_or_default()),
        url,
        source: Some(item.source.and_then(|s| s.name).unwrap_or_default()),
        published_at: Some(item.published_at.unwrap_or_default()),
        author: Some(item.author.unwrap_or_default()),
        image_url: Some(item.url_to_image.unwrap_or_default()),
        scraped_at: Some(Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        date_range: Some(date_range.to_string()),
    }
}
