//! ForecastEx Core: daily settlement price acquisition and merge.
//!
//! This crate contains the whole pipeline:
//! - Configuration (date range, endpoint, cache layout, pacing, merge rules)
//! - A blocking HTTP price source and the `PriceSource` trait it implements
//! - The append-only day cache, one raw CSV file per calendar day
//! - The acquirer, which fills missing days one request at a time
//! - The merger, which keeps affirmative-side rows with a settlement price and
//!   concatenates every day into one master table

pub mod config;
pub mod data;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{PipelineError, PipelineReport};
