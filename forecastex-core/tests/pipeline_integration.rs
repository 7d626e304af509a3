//! End-to-end runs of the two-stage pipeline with an in-memory source.

use chrono::NaiveDate;
use forecastex_core::data::{
    DataError, DayTable, FetchResponse, MergeOutcome, PriceSource, SilentProgress,
};
use forecastex_core::{pipeline, PipelineConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const HEADER: &str = "Contract,Side,Settlement Price";

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, day).unwrap()
}

/// Serves fixed bodies per day; unknown days answer 404.
struct FixedSource {
    bodies: HashMap<NaiveDate, String>,
    requests: AtomicUsize,
}

impl FixedSource {
    fn new(bodies: &[(NaiveDate, String)]) -> Self {
        Self {
            bodies: bodies.iter().cloned().collect(),
            requests: AtomicUsize::new(0),
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PriceSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<FetchResponse, DataError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.bodies.get(&date) {
            Some(body) => Ok(FetchResponse::new(200, body.clone())),
            None => Ok(FetchResponse::new(404, "")),
        }
    }
}

fn config_in(dir: &TempDir, start: NaiveDate, end: NaiveDate) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.range.start = start;
    cfg.range.end = end;
    cfg.cache.output_dir = dir.path().join("forecastex_prices");
    cfg.merge.master_path = dir.path().join("Forecastex_Price_Analysis.csv");
    cfg.fetch.request_delay_ms = 0;
    cfg
}

fn long_body(rows: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for (contract, side, price) in rows {
        body.push_str(&format!("{contract},{side},{price}\n"));
    }
    body
}

#[test]
fn full_run_fetches_then_merges() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir, d(1), d(3));
    let source = FixedSource::new(&[
        (
            d(1),
            long_body(&[("FED-SEP", "YES", "10"), ("FED-SEP", "NO", "")]),
        ),
        (
            d(2),
            long_body(&[("FED-SEP", "YES", ""), ("FED-SEP", "NO", "")]),
        ),
    ]);

    let report = pipeline::run(&cfg, &source, &SilentProgress).unwrap();

    assert_eq!(source.requests(), 3);
    assert_eq!(report.acquire.fetched, 2);
    assert_eq!(report.acquire.no_data, 1);

    let MergeOutcome::Written(summary) = report.merge else {
        panic!("expected master output");
    };
    assert_eq!(summary.rows, 1);

    let master = DayTable::from_path(&cfg.merge.master_path).unwrap();
    assert_eq!(
        master.headers,
        vec!["Data_Date", "Contract", "Side", "Settlement Price"]
    );
    assert_eq!(master.rows, vec![vec!["20240801", "FED-SEP", "YES", "10"]]);
}

#[test]
fn rerun_makes_no_requests_and_reproduces_master() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir, d(1), d(2));
    let bodies = [
        (
            d(1),
            long_body(&[("CPI-AUG", "YES", "3.25"), ("CPI-AUG", "NO", "96.75")]),
        ),
        (
            d(2),
            long_body(&[("CPI-AUG", "YES", "3.50"), ("CPI-AUG", "NO", "96.50")]),
        ),
    ];

    let first_source = FixedSource::new(&bodies);
    let first = pipeline::run(&cfg, &first_source, &SilentProgress).unwrap();

    let second_source = FixedSource::new(&bodies);
    let second = pipeline::run(&cfg, &second_source, &SilentProgress).unwrap();

    assert_eq!(second_source.requests(), 0);
    assert_eq!(second.acquire.cached, 2);
    match (first.merge, second.merge) {
        (MergeOutcome::Written(a), MergeOutcome::Written(b)) => {
            assert_eq!(a.content_hash, b.content_hash);
            assert_eq!(b.rows, 2);
        }
        _ => panic!("both runs should write a master file"),
    }
}

#[test]
fn nothing_fetched_reports_no_data() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir, d(1), d(3));
    let source = FixedSource::new(&[]);

    let report = pipeline::run(&cfg, &source, &SilentProgress).unwrap();

    assert_eq!(report.acquire.no_data, 3);
    assert!(matches!(report.merge, MergeOutcome::NoData { files_seen: 0, .. }));
    assert!(!cfg.merge.master_path.exists());
    assert!(cfg.cache.output_dir.is_dir(), "cache dir is created up front");
}

#[test]
fn merge_alone_uses_files_from_earlier_runs() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir, d(1), d(1));
    let cache = cfg.day_cache();
    cache
        .write(d(20), &long_body(&[("GDP", "YES", "2.1"), ("GDP", "NO", "97.9")]))
        .unwrap();

    let outcome = pipeline::merge(&cfg).unwrap();

    // The file lies outside the configured range; the merger still sees it.
    assert_eq!(outcome.rows(), 1);
}

#[test]
fn invalid_config_is_rejected_before_any_request() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config_in(&dir, d(1), d(3));
    cfg.range.start = d(5);
    let source = FixedSource::new(&[]);

    let err = pipeline::run(&cfg, &source, &SilentProgress).unwrap_err();

    assert!(matches!(err, pipeline::PipelineError::Config(_)));
    assert_eq!(source.requests(), 0);
}
