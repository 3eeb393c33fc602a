//! Stage selection for a single invocation.
//!
//! Each stage reads only what the previous one left on disk, so any of them
//! can be re-run on its own. The combined modes skip the downstream stages
//! when the crawl found nothing new.

use crate::api::NewsSource;
use crate::cli::Mode;
use crate::config::Config;
use crate::crawler::Fetcher;
use crate::error::Result;
use crate::processor::{ProcessedOutput, Processor};
use crate::sql::{SqlFiles, SqlGenerator};
use tracing::info;

/// What a pipeline invocation produced.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub crawled: Option<usize>,
    pub processed: Option<ProcessedOutput>,
    pub sql: Option<SqlFiles>,
}

async fn crawl<S: NewsSource>(config: &Config, source: S) -> usize {
    let mut fetcher = Fetcher::new(config, source).await;
    fetcher.run().await.len()
}

fn processed_count(summary: &PipelineSummary) -> usize {
    summary.processed.as_ref().map_or(0, |p| p.stats.total_articles)
}

/// Run the stages selected by `mode`. `source` is only used by crawling modes.
pub async fn run<S: NewsSource>(mode: Mode, config: &Config, source: S) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();

    match mode {
        Mode::CrawlOnly => {
            info!("Running crawler only");
            summary.crawled = Some(crawl(config, source).await);
        }
        Mode::ProcessOnly => {
            info!("Running data processor only");
            summary.processed = Processor::new(config).process_all().await?;
        }
        Mode::SqlOnly => {
            info!("Generating SQL only");
            summary.sql = SqlGenerator::new(config).generate_all().await?;
        }
        Mode::Full => {
            info!("Running complete pipeline");
            let crawled = crawl(config, source).await;
            summary.crawled = Some(crawled);
            if crawled > 0 {
                info!(articles = crawled, "Step 2: processing");
                summary.processed = Processor::new(config).process_all().await?;
                info!("Step 3: generating SQL");
                summary.sql = SqlGenerator::new(config).generate_all().await?;
                info!(
                    crawled,
                    processed = processed_count(&summary),
                    sql_path = %config.sql_path.display(),
                    "Pipeline complete"
                );
            } else {
                info!("No new articles to process");
            }
        }
        Mode::CrawlAndProcess => {
            info!("Running crawler and processor");
            let crawled = crawl(config, source).await;
            summary.crawled = Some(crawled);
            if crawled > 0 {
                info!(articles = crawled, "Step 2: processing");
                summary.processed = Processor::new(config).process_all().await?;
                info!(
                    crawled,
                    processed = processed_count(&summary),
                    processed_path = %config.processed_data_path.display(),
                    "Final summary; run with --sql-only to generate SQL"
                );
            } else {
                info!("No new articles to process");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{FakeSource, ok_response};
    use crate::config::test_config;

    fn quiet_config(root: &std::path::Path) -> Config {
        let mut config = test_config(root);
        config.days_back = 0;
        config.search_strategies.clear();
        config
    }

    #[tokio::test]
    async fn test_full_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(dir.path());
        let source =
            FakeSource::with(vec![Ok(ok_response(&["https://a.com/1", "https://b.com/2"]))]);

        let summary = run(Mode::Full, &config, source).await.unwrap();
        assert_eq!(summary.crawled, Some(2));
        let processed = summary.processed.unwrap();
        assert_eq!(processed.stats.total_articles, 2);
        assert!(processed.tsv_path.exists());
        let sql = summary.sql.unwrap();
        let insert = std::fs::read_to_string(sql.insert).unwrap();
        assert!(insert.contains("'https://b.com/2'"));
    }

    #[tokio::test]
    async fn test_default_mode_skips_processing_when_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(dir.path());

        let summary = run(Mode::CrawlAndProcess, &config, FakeSource::default()).await.unwrap();
        assert_eq!(summary.crawled, Some(0));
        assert!(summary.processed.is_none());
        assert!(summary.sql.is_none());
        assert!(!config.processed_data_path.exists());
    }

    #[tokio::test]
    async fn test_offline_stages_ignore_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(dir.path());
        let source = FakeSource::default();

        let summary = run(Mode::SqlOnly, &config, &source).await.unwrap();
        assert!(summary.crawled.is_none());
        assert!(summary.sql.is_none());
        assert!(source.requests().is_empty());

        let summary = run(Mode::ProcessOnly, &config, &source).await.unwrap();
        assert!(summary.processed.is_none());
    }
}
