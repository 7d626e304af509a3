//! Acquirer: walks a date range and fills the day cache, one request per missing day.
//!
//! Every outcome is local to its day. A timeout, an error page or a failed
//! write is recorded and the loop moves on; the day stays uncached and is
//! picked up again by the next run.

use super::cache::DayCache;
use super::provider::{DataError, FetchResponse, PriceSource};
use super::range::{date_label, DateRange};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for one acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// A body must be strictly longer than this (after trimming) to count as data.
    pub min_body_length: usize,
    /// Fixed pause after every day that was downloaded and cached.
    pub request_delay: Duration,
}

/// How the response for one day was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Data,
    NoData,
}

/// What happened to one day.
#[derive(Debug)]
pub enum DayOutcome {
    /// Already on disk; no request was made.
    Cached,
    /// Downloaded and written to the cache.
    Fetched { bytes: usize },
    /// The endpoint answered but with a bad status or a too-short body.
    NoData { status: u16 },
    /// Transport or write failure.
    Faulted { error: DataError },
}

impl DayOutcome {
    /// True if the day is still uncached and a later run should try it again.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self, DayOutcome::NoData { .. } | DayOutcome::Faulted { .. })
    }

    /// True if this outcome involved a network request.
    pub fn hit_network(&self) -> bool {
        !matches!(self, DayOutcome::Cached)
    }
}

/// Decide whether a response carries a real settlement file.
///
/// Needs a 200 status and a trimmed body longer than `min_body_length`; an
/// empty 200 or a short placeholder is not data.
pub fn classify_response(resp: &FetchResponse, min_body_length: usize) -> Classification {
    if resp.is_success() && resp.body.trim().len() > min_body_length {
        Classification::Data
    } else {
        Classification::NoData
    }
}

/// Progress callback for an acquisition pass.
pub trait AcquireProgress {
    /// Called once per day after its outcome is known.
    fn on_day(&self, date: NaiveDate, index: usize, total: usize, outcome: &DayOutcome);

    /// Called when the whole range is done.
    fn on_complete(&self, summary: &AcquireSummary);
}

/// Progress reporter that emits one `tracing` event per day.
pub struct LogProgress;

impl AcquireProgress for LogProgress {
    fn on_day(&self, date: NaiveDate, index: usize, total: usize, outcome: &DayOutcome) {
        let label = date_label(date);
        let n = index + 1;
        match outcome {
            DayOutcome::Cached => debug!(date = %label, n, total, "already cached"),
            DayOutcome::Fetched { bytes } => {
                info!(date = %label, n, total, bytes, "downloaded")
            }
            DayOutcome::NoData { status } => {
                info!(date = %label, n, total, status, "no data")
            }
            DayOutcome::Faulted { error } => {
                warn!(date = %label, n, total, error = %error, "error downloading")
            }
        }
    }

    fn on_complete(&self, summary: &AcquireSummary) {
        info!(
            total = summary.total,
            cached = summary.cached,
            fetched = summary.fetched,
            no_data = summary.no_data,
            faulted = summary.faulted,
            "download pass complete"
        );
    }
}

/// Progress reporter that does nothing.
pub struct SilentProgress;

impl AcquireProgress for SilentProgress {
    fn on_day(&self, _date: NaiveDate, _index: usize, _total: usize, _outcome: &DayOutcome) {}

    fn on_complete(&self, _summary: &AcquireSummary) {}
}

/// Summary of an acquisition pass.
#[derive(Debug, Default)]
pub struct AcquireSummary {
    pub total: usize,
    pub cached: usize,
    pub fetched: usize,
    pub no_data: usize,
    pub faulted: usize,
    /// Days that answered without data, with the observed status.
    pub empty_days: Vec<(NaiveDate, u16)>,
    pub faults: Vec<(NaiveDate, DataError)>,
}

impl AcquireSummary {
    /// Number of requests that went out.
    pub fn requests(&self) -> usize {
        self.fetched + self.no_data + self.faulted
    }

    /// Days still missing from the cache after this pass.
    pub fn retry_eligible(&self) -> usize {
        self.no_data + self.faulted
    }

    fn record(&mut self, date: NaiveDate, outcome: DayOutcome) {
        match outcome {
            DayOutcome::Cached => self.cached += 1,
            DayOutcome::Fetched { .. } => self.fetched += 1,
            DayOutcome::NoData { status } => {
                self.no_data += 1;
                self.empty_days.push((date, status));
            }
            DayOutcome::Faulted { error } => {
                self.faulted += 1;
                self.faults.push((date, error));
            }
        }
    }
}

/// Acquire every day of `range` that the cache does not hold yet.
///
/// Days are visited in ascending order. Cached days cost nothing; every other
/// day gets exactly one request. Only a successful download is followed by
/// the fixed request delay.
pub fn acquire_range(
    source: &dyn PriceSource,
    cache: &DayCache,
    range: &DateRange,
    opts: &AcquireOptions,
    progress: &dyn AcquireProgress,
) -> AcquireSummary {
    let total = range.len();
    let mut summary = AcquireSummary {
        total,
        ..AcquireSummary::default()
    };

    for (i, date) in range.days().enumerate() {
        let outcome = acquire_day(source, cache, date, opts.min_body_length);
        progress.on_day(date, i, total, &outcome);

        let pause =
            matches!(outcome, DayOutcome::Fetched { .. }) && !opts.request_delay.is_zero();
        summary.record(date, outcome);

        if pause {
            std::thread::sleep(opts.request_delay);
        }
    }

    progress.on_complete(&summary);
    summary
}

/// Acquire a single day: cache check -> fetch -> classify -> write.
pub fn acquire_day(
    source: &dyn PriceSource,
    cache: &DayCache,
    date: NaiveDate,
    min_body_length: usize,
) -> DayOutcome {
    if cache.contains(date) {
        return DayOutcome::Cached;
    }

    let resp = match source.fetch_day(date) {
        Ok(resp) => resp,
        Err(error) => return DayOutcome::Faulted { error },
    };

    match classify_response(&resp, min_body_length) {
        Classification::NoData => DayOutcome::NoData {
            status: resp.status,
        },
        Classification::Data => match cache.write(date, &resp.body) {
            Ok(_) => DayOutcome::Fetched {
                bytes: resp.body.len(),
            },
            Err(error) => DayOutcome::Faulted { error },
        },
    }
}
