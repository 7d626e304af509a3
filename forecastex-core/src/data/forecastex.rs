//! ForecastEx daily price download endpoint.
//!
//! One GET per day: `{base_url}?type={data_type}&date={YYYYMMDD}`. The body is
//! a CSV document with one row per contract side. There is no retry here; a
//! day that fails is simply retried on the next run because nothing was cached.

use super::provider::{DataError, FetchResponse, PriceSource};
use super::range::date_label;
use crate::config::SourceConfig;
use chrono::NaiveDate;
use std::time::Duration;

/// ForecastEx price source.
pub struct ForecastExSource {
    client: reqwest::blocking::Client,
    base_url: String,
    data_type: String,
}

impl ForecastExSource {
    pub fn new(source: &SourceConfig, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("forecastex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: source.base_url.clone(),
            data_type: source.data_type.clone(),
        })
    }

    /// Build the download URL for one day.
    pub fn day_url(&self, date: NaiveDate) -> String {
        day_url(&self.base_url, &self.data_type, date)
    }
}

/// `{base_url}?type={data_type}&date={YYYYMMDD}`
pub fn day_url(base_url: &str, data_type: &str, date: NaiveDate) -> String {
    format!("{base_url}?type={data_type}&date={}", date_label(date))
}

impl PriceSource for ForecastExSource {
    fn name(&self) -> &str {
        "forecastex"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<FetchResponse, DataError> {
        let url = self.day_url(date);

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::Timeout(format!("{url}: {e}"))
            } else {
                DataError::Network(format!("{url}: {e}"))
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| {
            if e.is_timeout() {
                DataError::Timeout(format!("{url}: reading body: {e}"))
            } else {
                DataError::MalformedResponse(format!("{url}: {e}"))
            }
        })?;

        Ok(FetchResponse { status, body })
    }
}
