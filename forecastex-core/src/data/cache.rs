//! Per-day file cache for raw settlement downloads.
//!
//! Layout: `{output_dir}/{prefix}{YYYYMMDD}{suffix}`, e.g.
//! `forecastex_prices/prices_20240801.csv`.
//!
//! Features:
//! - Presence is decided by filename alone, so re-runs skip finished days
//! - Append-only: an existing entry is never overwritten
//! - Atomic writes (write to .tmp, rename into place), so an interrupted run
//!   never leaves a half-written day behind
//! - Coverage report over a date range (cached vs missing days)

use super::provider::DataError;
use super::range::{date_label, parse_date_label, DateRange};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One cached day found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub date: NaiveDate,
    /// `YYYYMMDD`, taken from the filename.
    pub label: String,
    pub path: PathBuf,
}

/// How much of a date range the cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub range: DateRange,
    pub total: usize,
    pub cached: usize,
    pub missing: Vec<NaiveDate>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// The day cache.
#[derive(Debug, Clone)]
pub struct DayCache {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl DayCache {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Root directory of the cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), DataError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            DataError::Cache(format!("failed to create {}: {e}", self.dir.display()))
        })
    }

    /// Deterministic filename for a day: `{prefix}{YYYYMMDD}{suffix}`.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}{}{}", self.prefix, date_label(date), self.suffix)
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(self.file_name(date))
    }

    /// True if a file for this day is already on disk.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.path_for(date).is_file()
    }

    /// Persist a day's raw body verbatim.
    ///
    /// Fails if the day is already cached; callers check `contains` first.
    pub fn write(&self, date: NaiveDate, body: &str) -> Result<PathBuf, DataError> {
        let path = self.path_for(date);
        if path.exists() {
            return Err(DataError::Cache(format!(
                "refusing to overwrite {}",
                path.display()
            )));
        }
        self.ensure_dir()?;

        let tmp_path = self.dir.join(format!("{}.tmp", self.file_name(date)));
        fs::write(&tmp_path, body)
            .map_err(|e| DataError::Cache(format!("write {}: {e}", tmp_path.display())))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        Ok(path)
    }

    /// Recover the date label from a cache filename, if it is one of ours.
    pub fn label_from_file_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        let label = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        parse_date_label(label).map(|_| label)
    }

    /// All cache entries on disk, sorted by filename (and therefore by date).
    ///
    /// Files that don't follow the naming scheme (temp files, notes, a master
    /// file written into the same directory) are ignored. A missing directory
    /// is an empty cache.
    pub fn entries(&self) -> Result<Vec<CacheEntry>, DataError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let listing = fs::read_dir(&self.dir)
            .map_err(|e| DataError::Cache(format!("read dir {}: {e}", self.dir.display())))?;

        for item in listing {
            let item = item.map_err(|e| DataError::Cache(format!("dir entry: {e}")))?;
            let path = item.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(label) = self.label_from_file_name(name) else {
                continue;
            };
            let Some(date) = parse_date_label(label) else {
                continue;
            };
            entries.push(CacheEntry {
                date,
                label: label.to_string(),
                path: path.clone(),
            });
        }

        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(entries)
    }

    /// Which days of `range` are cached and which are still missing.
    pub fn coverage(&self, range: &DateRange) -> Coverage {
        let missing: Vec<NaiveDate> = range.days().filter(|d| !self.contains(*d)).collect();
        Coverage {
            range: *range,
            total: range.len(),
            cached: range.len() - missing.len(),
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cache_in(dir: &TempDir) -> DayCache {
        DayCache::new(dir.path().join("prices"), "prices_", ".csv")
    }

    #[test]
    fn file_name_is_fixed_width() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert_eq!(cache.file_name(d(2024, 8, 1)), "prices_20240801.csv");
        assert_eq!(cache.file_name(d(2025, 12, 31)), "prices_20251231.csv");
    }

    #[test]
    fn write_then_contains() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert!(!cache.contains(d(2024, 8, 1)));
        let path = cache.write(d(2024, 8, 1), "a,b\n1,2\n").unwrap();
        assert!(cache.contains(d(2024, 8, 1)));
        assert_eq!(fs::read_to_string(path).unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn write_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.write(d(2024, 8, 1), "first").unwrap();
        let err = cache.write(d(2024, 8, 1), "second").unwrap_err();
        assert!(matches!(err, DataError::Cache(_)));
        assert_eq!(
            fs::read_to_string(cache.path_for(d(2024, 8, 1))).unwrap(),
            "first"
        );
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.write(d(2024, 8, 1), "x").unwrap();

        let names: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["prices_20240801.csv"]);
    }

    #[test]
    fn entries_are_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.write(d(2024, 8, 3), "c").unwrap();
        cache.write(d(2024, 8, 1), "a").unwrap();
        cache.write(d(2024, 8, 2), "b").unwrap();
        fs::write(cache.dir().join("notes.csv"), "x").unwrap();
        fs::write(cache.dir().join("prices_2024080.csv"), "x").unwrap();
        fs::write(cache.dir().join("prices_20240804.csv.tmp"), "x").unwrap();

        let labels: Vec<_> = cache.entries().unwrap().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["20240801", "20240802", "20240803"]);
    }

    #[test]
    fn missing_dir_is_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn label_from_file_name() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert_eq!(
            cache.label_from_file_name("prices_20240801.csv"),
            Some("20240801")
        );
        assert_eq!(cache.label_from_file_name("trades_20240801.csv"), None);
        assert_eq!(cache.label_from_file_name("prices_20240801.txt"), None);
    }

    #[test]
    fn coverage_reports_missing_days() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.write(d(2024, 8, 2), "b").unwrap();

        let range = DateRange::new(d(2024, 8, 1), d(2024, 8, 3)).unwrap();
        let cov = cache.coverage(&range);
        assert_eq!(cov.total, 3);
        assert_eq!(cov.cached, 1);
        assert_eq!(cov.missing, vec![d(2024, 8, 1), d(2024, 8, 3)]);
        assert!(!cov.is_complete());
    }
}
