//! Merger: turns the cached day files into one settlement price table.
//!
//! Each day file lists every contract twice, affirmative side first and
//! negative side second. Per file the merger keeps the affirmative rows
//! (positions 0, 2, 4, ...), drops rows without a settlement price, tags the
//! survivors with the day's `YYYYMMDD` label and appends them to the master
//! table. Files are processed in filename order, which is date order.
//!
//! Nothing here is fatal per file: an unreadable file is skipped, a file with
//! no settlement column is kept unfiltered with a warning.

use super::cache::{CacheEntry, DayCache};
use super::provider::DataError;
use super::table::{DayTable, TableError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filtering rules applied to each day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Substring identifying the settlement price column.
    pub price_column_marker: String,
    /// Name of the leading date label column added to every surviving row.
    pub date_column: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            price_column_marker: "Settlement".to_string(),
            date_column: "Data_Date".to_string(),
        }
    }
}

/// Result of filtering one day table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredDay {
    /// Surviving rows with the date label column in front; `None` if nothing survived.
    pub table: Option<DayTable>,
    /// Rows in the file before any filtering.
    pub source_rows: usize,
    /// Affirmative-side rows considered.
    pub outcome_rows: usize,
    /// Rows dropped for a blank settlement price.
    pub dropped_blank: usize,
    /// Header of the settlement column, if one was found.
    pub price_column: Option<String>,
    /// The row count was odd, so the last row has no partner.
    pub unpaired: bool,
}

impl FilteredDay {
    pub fn surviving_rows(&self) -> usize {
        self.table.as_ref().map_or(0, DayTable::row_count)
    }
}

/// Locate the settlement price column.
///
/// Case-sensitive substring match over the header, first match wins. When
/// nothing matches the caller keeps every affirmative row rather than dropping
/// the day.
pub fn find_price_column(table: &DayTable, marker: &str) -> Option<usize> {
    table.find_column_containing(marker)
}

/// Apply the per-day rules to one parsed file.
///
/// A file that already has a column named like the date label column is
/// refused, since the label could not be told apart from the file's own data.
pub fn filter_day(
    table: &DayTable,
    label: &str,
    opts: &MergeOptions,
) -> Result<FilteredDay, TableError> {
    if table.column_index(&opts.date_column).is_some() {
        return Err(TableError::ColumnExists(opts.date_column.clone()));
    }

    let source_rows = table.row_count();
    let unpaired = source_rows % 2 == 1;
    if unpaired {
        warn!(
            date = label,
            rows = source_rows,
            "odd row count, last row has no negative-side partner"
        );
    }

    // Pair structure must be resolved before any rows are dropped.
    let mut outcome = table.even_rows();
    let outcome_rows = outcome.row_count();

    let price_idx = find_price_column(&outcome, &opts.price_column_marker);
    let price_column = price_idx.map(|i| outcome.headers[i].clone());
    let dropped_blank = match price_idx {
        Some(idx) => outcome.drop_blank(idx)?,
        None => {
            warn!(
                date = label,
                marker = %opts.price_column_marker,
                "could not find settlement price column, keeping rows unfiltered"
            );
            0
        }
    };

    // Label only what survived.
    let table = if outcome.is_empty() {
        None
    } else {
        outcome.insert_column(0, &opts.date_column, label)?;
        Some(outcome)
    };

    Ok(FilteredDay {
        table,
        source_rows,
        outcome_rows,
        dropped_blank,
        price_column,
        unpaired,
    })
}

/// A cache file that could not be used.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: TableError,
}

/// Statistics for a merge that produced output.
#[derive(Debug)]
pub struct MergeSummary {
    pub files_seen: usize,
    pub days_contributed: usize,
    pub rows: usize,
    pub skipped: Vec<SkippedFile>,
    /// Labels of days that had no settlement column.
    pub missing_price_column: Vec<String>,
    /// Labels of days with an odd row count.
    pub unpaired_days: Vec<String>,
    pub output: PathBuf,
    /// BLAKE3 hex digest of the written master file.
    pub content_hash: String,
}

/// What a merge pass ended with.
#[derive(Debug)]
pub enum MergeOutcome {
    /// The master table was written.
    Written(MergeSummary),
    /// No file produced a single surviving row; nothing was written.
    NoData {
        files_seen: usize,
        skipped: Vec<SkippedFile>,
    },
}

impl MergeOutcome {
    pub fn rows(&self) -> usize {
        match self {
            MergeOutcome::Written(s) => s.rows,
            MergeOutcome::NoData { .. } => 0,
        }
    }
}

/// Everything the merger accumulated before writing.
#[derive(Debug, Default)]
pub struct MergedDays {
    pub days: Vec<DayTable>,
    pub files_seen: usize,
    pub skipped: Vec<SkippedFile>,
    pub missing_price_column: Vec<String>,
    pub unpaired_days: Vec<String>,
}

impl MergedDays {
    /// The master table: all days concatenated in order.
    pub fn master(&self) -> Option<DayTable> {
        if self.days.is_empty() {
            None
        } else {
            Some(DayTable::concat(&self.days))
        }
    }
}

/// Filter every cache entry, in the order given.
pub fn collect_days(entries: &[CacheEntry], opts: &MergeOptions) -> MergedDays {
    let mut merged = MergedDays {
        files_seen: entries.len(),
        ..MergedDays::default()
    };

    for entry in entries {
        let filtered = DayTable::from_path(&entry.path).and_then(|table| {
            if table.is_empty() {
                debug!(date = %entry.label, "no rows");
                return Ok(None);
            }
            filter_day(&table, &entry.label, opts).map(Some)
        });

        let filtered = match filtered {
            Ok(Some(f)) => f,
            Ok(None) => continue,
            Err(error) => {
                warn!(file = %entry.path.display(), error = %error, "skipping unreadable file");
                merged.skipped.push(SkippedFile {
                    path: entry.path.clone(),
                    error,
                });
                continue;
            }
        };

        if filtered.price_column.is_none() {
            merged.missing_price_column.push(entry.label.clone());
        }
        if filtered.unpaired {
            merged.unpaired_days.push(entry.label.clone());
        }
        if let Some(table) = filtered.table {
            merged.days.push(table);
        }
    }

    merged
}

/// Merge every day file in `cache` into the master CSV at `master_path`.
///
/// The master file is only written when at least one row survived; it
/// replaces any previous version.
pub fn merge_cache(
    cache: &DayCache,
    master_path: &Path,
    opts: &MergeOptions,
) -> Result<MergeOutcome, DataError> {
    let entries = cache.entries()?;
    info!(files = entries.len(), dir = %cache.dir().display(), "processing cached files");

    let merged = collect_days(&entries, opts);
    let Some(master) = merged.master() else {
        info!(files = merged.files_seen, "no valid data found");
        return Ok(MergeOutcome::NoData {
            files_seen: merged.files_seen,
            skipped: merged.skipped,
        });
    };

    let csv = master.to_csv_string()?;
    write_master(master_path, &csv)?;
    let content_hash = blake3::hash(csv.as_bytes()).to_hex().to_string();

    info!(
        output = %master_path.display(),
        rows = master.row_count(),
        days = merged.days.len(),
        "saved master file"
    );

    Ok(MergeOutcome::Written(MergeSummary {
        files_seen: merged.files_seen,
        days_contributed: merged.days.len(),
        rows: master.row_count(),
        skipped: merged.skipped,
        missing_price_column: merged.missing_price_column,
        unpaired_days: merged.unpaired_days,
        output: master_path.to_path_buf(),
        content_hash,
    }))
}

/// Write the master file atomically, creating its parent directory.
fn write_master(path: &Path, contents: &str) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::Io(e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> DayTable {
        DayTable::from_reader(text.as_bytes()).unwrap()
    }

    fn opts() -> MergeOptions {
        MergeOptions::default()
    }

    #[test]
    fn refuses_file_that_already_has_date_column() {
        let t = parse("Contract,Data_Date,Settlement Price\nA,X,1\nA,X,2\n");
        let err = filter_day(&t, "20240801", &opts()).unwrap_err();
        assert!(matches!(err, TableError::ColumnExists(name) if name == "Data_Date"));
    }

    #[test]
    fn keeps_affirmative_rows_only() {
        let t = parse(
            "Contract,Side,Settlement Price\n\
             A1,YES,1\nB1,NO,99\nA2,YES,2\nB2,NO,98\nA3,YES,3\nB3,NO,97\n",
        );
        let f = filter_day(&t, "20240801", &opts()).unwrap();
        let out = f.table.unwrap();
        assert_eq!(out.column_values(1).unwrap(), vec!["A1", "A2", "A3"]);
        assert_eq!(f.outcome_rows, 3);
        assert!(!f.unpaired);
    }

    #[test]
    fn drops_blank_settlement_and_labels_survivors() {
        let t = parse(
            "Contract,Side,Settlement Price\n\
             A1,YES,12.5\nB1,NO,87.5\nA2,YES,\nB2,NO,\nA3,YES,7.0\nB3,NO,93.0\n",
        );
        let f = filter_day(&t, "20240801", &opts()).unwrap();
        assert_eq!(f.dropped_blank, 1);
        let out = f.table.unwrap();
        assert_eq!(
            out.headers,
            vec!["Data_Date", "Contract", "Side", "Settlement Price"]
        );
        assert_eq!(out.rows[0], vec!["20240801", "A1", "YES", "12.5"]);
        assert_eq!(out.rows[1], vec!["20240801", "A3", "YES", "7.0"]);
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn pairing_is_decided_before_blank_drop() {
        // A blank affirmative price must not promote the negative row behind it.
        let t = parse("id,Settlement Price\nA1,\nB1,55\nA2,4\nB2,96\n");
        let f = filter_day(&t, "20240801", &opts()).unwrap();
        assert_eq!(f.table.unwrap().column_values(1).unwrap(), vec!["A2"]);
    }

    #[test]
    fn missing_price_column_keeps_all_affirmative_rows() {
        let t = parse("Contract,Side,Close\nA1,YES,\nB1,NO,\nA2,YES,3\nB2,NO,4\n");
        let f = filter_day(&t, "20240805", &opts()).unwrap();
        assert!(f.price_column.is_none());
        assert_eq!(f.dropped_blank, 0);
        let out = f.table.unwrap();
        assert_eq!(out.column_values(1).unwrap(), vec!["A1", "A2"]);
    }

    #[test]
    fn odd_row_count_is_flagged() {
        let t = parse("id,Settlement Price\nA1,1\nB1,2\nA2,3\n");
        let f = filter_day(&t, "20240801", &opts()).unwrap();
        assert!(f.unpaired);
        assert_eq!(f.surviving_rows(), 2);
    }

    #[test]
    fn nothing_survives_means_no_table() {
        let t = parse("id,Settlement Price\nA1,\nB1,\n");
        let f = filter_day(&t, "20240802", &opts()).unwrap();
        assert!(f.table.is_none());
        assert_eq!(f.surviving_rows(), 0);
    }

    #[test]
    fn price_column_lookup_first_match() {
        let t = parse("Prev Settlement,Settlement Price\n");
        assert_eq!(find_price_column(&t, "Settlement"), Some(0));
        assert_eq!(find_price_column(&t, "settlement"), None);
    }

    #[test]
    fn custom_marker_and_date_column() {
        let t = parse("id,Final\nA1,1\nB1,2\n");
        let o = MergeOptions {
            price_column_marker: "Final".into(),
            date_column: "day".into(),
        };
        let out = filter_day(&t, "20250101", &o).unwrap().table.unwrap();
        assert_eq!(out.headers[0], "day");
        assert_eq!(out.rows, vec![vec!["20250101", "A1", "1"]]);
    }
}
