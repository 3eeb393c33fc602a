//! # Stock News
//!
//! Collects stock market news from NewsAPI and turns it into loadable data.
//!
//! ## Usage
//!
//! ```sh
//! stock_news                 # crawl, then process
//! stock_news --crawl-only
//! stock_news --process-only
//! stock_news --sql-only
//! stock_news --full          # crawl, process, and generate SQL
//! ```
//!
//! ## Architecture
//!
//! Three batch stages hand off through the filesystem:
//! 1. **Crawl**: query the API, skip URLs recorded in the checkpoint, and
//!    append each new batch to `data_path`
//! 2. **Process**: rebuild a deduplicated TSV export and summary statistics
//!    from every batch file
//! 3. **SQL**: rebuild DDL, insert, and upsert scripts from every batch file

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod checkpoint;
mod cli;
mod config;
mod crawler;
mod error;
mod models;
mod outputs;
mod pipeline;
mod processor;
mod sql;
mod utils;

use api::NewsApiClient;
use cli::{Cli, Mode};
use config::Config;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("stock_news starting up");

    let args = Cli::parse();
    let mode = args.mode();
    debug!(?mode, config = %args.config.display(), "Parsed CLI arguments");

    let config = match Config::load(&args.config, args.api_key.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    let output_dir = match mode {
        Mode::CrawlOnly => None,
        Mode::SqlOnly => Some(&config.sql_path),
        _ => Some(&config.processed_data_path),
    };
    if let Some(dir) = output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let source = NewsApiClient::new(&config)?;
    let summary = pipeline::run(mode, &config, source).await?;

    if let Some(processed) = &summary.processed {
        info!(
            rows = processed.table.rows.len(),
            duplicates_removed = processed.table.duplicates_removed,
            tsv = %processed.tsv_path.display(),
            stats = %processed.stats_path.display(),
            "Processed outputs"
        );
    }
    if let Some(sql) = &summary.sql {
        info!(
            create_table = %sql.create_table.display(),
            insert = %sql.insert.display(),
            upsert = %sql.upsert.display(),
            combined = %sql.combined.display(),
            "SQL outputs"
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        crawled = ?summary.crawled,
        "Execution complete"
    );

    Ok(())
}
