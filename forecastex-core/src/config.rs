//! Pipeline configuration.
//!
//! One value carries everything both stages need: which days to fetch, where
//! to fetch them from, where the day cache and the master file live, and the
//! request pacing. Every TOML table and key is optional; anything left out
//! falls back to the historical defaults below.
//!
//! ```toml
//! [range]
//! start = "2024-08-01"
//! end = "2026-01-12"
//!
//! [fetch]
//! request_timeout_ms = 10000
//! min_body_length = 50
//! request_delay_ms = 100
//! ```

use crate::data::acquire::AcquireOptions;
use crate::data::cache::DayCache;
use crate::data::merge::MergeOptions;
use crate::data::range::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub range: RangeConfig,
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub merge: MergeConfig,
}

/// Inclusive date range to acquire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap_or_default(),
        }
    }
}

/// Remote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Value of the `type` query parameter.
    pub data_type: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://forecastex.com/api/download".to_string(),
            data_type: "prices".to_string(),
        }
    }
}

/// Day cache location and naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub file_suffix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("forecastex_prices"),
            file_prefix: "prices_".to_string(),
            file_suffix: ".csv".to_string(),
        }
    }
}

/// Request pacing and the "is this real data" threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub request_timeout_ms: u64,
    pub min_body_length: usize,
    pub request_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            min_body_length: 50,
            request_delay_ms: 100,
        }
    }
}

/// Master file location and per-day filtering rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub master_path: PathBuf,
    pub price_column_marker: String,
    pub date_column: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let rules = MergeOptions::default();
        Self {
            master_path: PathBuf::from("Forecastex_Price_Analysis.csv"),
            price_column_marker: rules.price_column_marker,
            date_column: rules.date_column,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.date_range()?;
        if self.cache.file_prefix.is_empty() && self.cache.file_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "cache.file_prefix and cache.file_suffix cannot both be empty".into(),
            ));
        }
        if self.merge.price_column_marker.is_empty() {
            return Err(ConfigError::Invalid(
                "merge.price_column_marker cannot be empty".into(),
            ));
        }
        if self.merge.date_column.is_empty() {
            return Err(ConfigError::Invalid(
                "merge.date_column cannot be empty".into(),
            ));
        }
        if self.fetch.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.request_timeout_ms must be positive".into(),
            ));
        }
        if self.source.base_url.is_empty() {
            return Err(ConfigError::Invalid("source.base_url cannot be empty".into()));
        }
        Ok(())
    }

    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::new(self.range.start, self.range.end)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch.request_timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.fetch.request_delay_ms)
    }

    pub fn day_cache(&self) -> DayCache {
        DayCache::new(
            &self.cache.output_dir,
            &self.cache.file_prefix,
            &self.cache.file_suffix,
        )
    }

    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions {
            min_body_length: self.fetch.min_body_length,
            request_delay: self.request_delay(),
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            price_column_marker: self.merge.price_column_marker.clone(),
            date_column: self.merge.date_column.clone(),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
