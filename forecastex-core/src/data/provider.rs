//! Price source trait and structured error types.
//!
//! The PriceSource trait abstracts over where a day's settlement file comes
//! from (the ForecastEx download endpoint, a test double) so the acquirer can
//! be exercised without a network.

use chrono::NaiveDate;
use thiserror::Error;

use super::table::TableError;

/// Structured error types for data operations.
///
/// These are displayable in CLI log lines as-is.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("data error: {0}")]
    Other(String),
}

/// What the transport saw for a single day's request.
///
/// Any response with a status line is a `FetchResponse`, including 404s and
/// error pages; deciding whether it carries data is the acquirer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True only for 200 OK. Partial and non-authoritative answers are not data.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Trait for daily price sources.
///
/// Implementations make exactly one attempt per call. Transport faults
/// (timeouts, refused connections, undecodable bodies) are returned as `Err`;
/// the cache layer sits above this trait and providers don't know about it.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the raw settlement file for one calendar day.
    fn fetch_day(&self, date: NaiveDate) -> Result<FetchResponse, DataError>;
}
