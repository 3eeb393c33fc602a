//! File outputs for each pipeline stage.
//!
//! # Submodules
//!
//! - [`batch`]: Raw article batches, written by the crawler and read back by
//!   the processor and SQL emitter
//! - [`tsv`]: Tab-separated export of the processed table
//! - [`json`]: Summary statistics file
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── checkpoint.json
//! ├── stock_news_batch_1_20240305_143000.json
//! └── stock_news_batch_2_20240305_143004.json
//!
//! processed_data/
//! ├── stock_news_processed_20240305_150000.csv
//! └── summary_stats_20240305_150000.json
//! ```

pub mod batch;
pub mod json;
pub mod tsv;
