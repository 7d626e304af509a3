//! Two-stage driver: acquire the configured range, then merge the cache.
//!
//! The stages share nothing in memory. The merger discovers its inputs by
//! listing the cache directory, so it sees days cached by earlier runs as well
//! as the ones this run downloaded.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::acquire::{acquire_range, AcquireProgress, AcquireSummary};
use crate::data::merge::{merge_cache, MergeOutcome};
use crate::data::provider::{DataError, PriceSource};
use thiserror::Error;
use tracing::info;

/// Failures that stop a whole run. Per-day and per-file problems never do.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct PipelineReport {
    pub acquire: AcquireSummary,
    pub merge: MergeOutcome,
}

/// Fill the cache for the configured range.
pub fn acquire(
    config: &PipelineConfig,
    source: &dyn PriceSource,
    progress: &dyn AcquireProgress,
) -> Result<AcquireSummary, PipelineError> {
    let range = config.date_range()?;
    let cache = config.day_cache();
    cache.ensure_dir()?;

    info!(
        source = source.name(),
        %range,
        dir = %cache.dir().display(),
        "starting download"
    );
    Ok(acquire_range(
        source,
        &cache,
        &range,
        &config.acquire_options(),
        progress,
    ))
}

/// Merge whatever the cache holds into the master file.
pub fn merge(config: &PipelineConfig) -> Result<MergeOutcome, PipelineError> {
    let cache = config.day_cache();
    Ok(merge_cache(
        &cache,
        &config.merge.master_path,
        &config.merge_options(),
    )?)
}

/// Acquire, then merge.
pub fn run(
    config: &PipelineConfig,
    source: &dyn PriceSource,
    progress: &dyn AcquireProgress,
) -> Result<PipelineReport, PipelineError> {
    config.validate()?;
    let acquire = acquire(config, source, progress)?;
    let merge = merge(config)?;
    Ok(PipelineReport { acquire, merge })
}
