//! # Manuscript Screener
//!
//! Screens batches of scientific manuscript metadata before full-text
//! review. Records are loaded from CSV/TSV, passed through a fixed sequence
//! of filters, tagged with the reasons behind every decision, and written
//! back out as CSV or JSON.
//!
//! ## Architecture
//!
//! - [`models`]: manuscript records, article types, relevance scores, run totals
//! - [`filters`]: deduplication, language, article type and topic relevance
//! - [`pipeline`]: ordered filter execution and the end-to-end [`Screener`]
//! - [`extraction`]: batched LLM boundary used by AI-assisted filters
//! - [`io`]: record loading and result writing
//! - [`config`]: TOML configuration with environment overrides
//! - [`ui`]: terminal output for the CLI
//! - [`utils`]: text normalization and retry helpers
//!
//! ## Example
//!
//! ```rust,no_run
//! use manuscript_screener::config::load_config;
//! use manuscript_screener::Screener;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(Path::new("screening.toml"))?;
//! let report = Screener::new().screen(&config).await?;
//! println!("{} of {} included", report.run.included_records, report.run.total_records);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod extraction;
pub mod filters;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::ScreeningConfig;
pub use models::{ManuscriptRecord, ScreeningRun};
pub use pipeline::{run_pipeline, Pipeline, Screener, ScreeningError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
