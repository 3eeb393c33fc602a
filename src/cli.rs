//! Command-line interface definitions.
//!
//! The stage flags are mutually exclusive. With none of them the crawler runs
//! and, if it collected anything, the processor follows.

use clap::Parser;
use std::path::PathBuf;

/// Which stages a single invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Crawl, then process if anything new was collected.
    CrawlAndProcess,
    CrawlOnly,
    ProcessOnly,
    SqlOnly,
    /// Crawl, then process and emit SQL if anything new was collected.
    Full,
}

/// Collect stock news and turn it into TSV and SQL outputs.
///
/// # Examples
///
/// ```sh
/// # Crawl and process with ./config.yaml
/// stock_news
///
/// # Regenerate SQL from existing batch files
/// stock_news --sql-only
///
/// # Everything, with the API key taken from the environment
/// NEWSAPI_KEY=... stock_news --full --config /etc/stock_news.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group = clap::ArgGroup::new("mode").multiple(false))]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "STOCK_NEWS_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// NewsAPI key (overrides `api_key` in the config file)
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Only fetch new articles
    #[arg(long, group = "mode")]
    pub crawl_only: bool,

    /// Only normalize existing batch files
    #[arg(long, group = "mode")]
    pub process_only: bool,

    /// Only generate SQL from existing batch files
    #[arg(long, group = "mode")]
    pub sql_only: bool,

    /// Crawl, process, and generate SQL
    #[arg(long, group = "mode")]
    pub full: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.crawl_only {
            Mode::CrawlOnly
        } else if self.process_only {
            Mode::ProcessOnly
        } else if self.sql_only {
            Mode::SqlOnly
        } else if self.full {
            Mode::Full
        } else {
            Mode::CrawlAndProcess
        }
    }
}
