//! String-valued CSV tables.
//!
//! Settlement files are kept as text end to end: values are never parsed as
//! numbers, so whatever the exchange published is what lands in the master
//! file. The operations here are the handful the merger needs: row selection
//! by position, dropping rows with a missing value, a constant leading column,
//! and ordered concatenation.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// Values treated as missing, in addition to empty / whitespace-only cells.
///
/// The list matches the NA markers common dataframe readers recognise by
/// default, so a file that says `NaN` in the settlement column is dropped the
/// same way a blank cell is.
pub const NA_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("no header row")]
    Empty,

    #[error("row {row} has {found} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column index {index} out of range ({columns} columns)")]
    NoSuchColumn { index: usize, columns: usize },

    #[error("column '{0}' already exists")]
    ColumnExists(String),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// True when a cell counts as missing: blank after trimming, or an NA marker.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || NA_MARKERS.contains(&trimmed)
}

/// Rename repeated header names to `name.1`, `name.2`, ..., skipping any
/// suffix that is already taken.
fn dedupe_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut taken: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
    let mut first_seen: HashSet<&str> = HashSet::new();
    let mut counters: HashMap<&str, usize> = HashMap::new();

    names
        .iter()
        .map(|&name| {
            if first_seen.insert(name) {
                return name.to_string();
            }
            let counter = counters.entry(name).or_default();
            loop {
                *counter += 1;
                let candidate = format!("{name}.{counter}");
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}

/// A parsed CSV file: one header row plus data rows of equal width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DayTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse CSV text. The first record is the header.
    ///
    /// Rows shorter than the header are padded with blanks; longer rows are
    /// rejected since there is no column to put the extra fields in. Repeated
    /// header names get a `.1`, `.2`, ... suffix so every column stays
    /// addressable by name.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = rdr.records();
        let headers: Vec<String> = match records.next() {
            Some(header) => dedupe_headers(header?.iter()),
            None => return Err(TableError::Empty),
        };
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(TableError::Empty);
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for (i, record) in records.enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(TableError::RaggedRow {
                    row: i + 1,
                    expected: width,
                    found: record.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact header lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First column whose header contains `marker` (case-sensitive).
    ///
    /// This is the only place a column is identified by substring, so the
    /// "first match wins" rule lives here and nowhere else.
    pub fn find_column_containing(&self, marker: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.contains(marker))
    }

    /// Rows at positions 0, 2, 4, ... with column order unchanged.
    pub fn even_rows(&self) -> DayTable {
        DayTable {
            headers: self.headers.clone(),
            rows: self.rows.iter().step_by(2).cloned().collect(),
        }
    }

    /// Remove every row whose value in `column` is missing.
    pub fn drop_blank(&mut self, column: usize) -> Result<usize, TableError> {
        self.check_column(column)?;
        let before = self.rows.len();
        self.rows.retain(|row| !is_missing(&row[column]));
        Ok(before - self.rows.len())
    }

    /// Insert a column holding the same value in every row.
    pub fn insert_column(
        &mut self,
        index: usize,
        name: &str,
        value: &str,
    ) -> Result<(), TableError> {
        if index > self.headers.len() {
            return Err(TableError::NoSuchColumn {
                index,
                columns: self.headers.len(),
            });
        }
        if self.column_index(name).is_some() {
            return Err(TableError::ColumnExists(name.to_string()));
        }
        self.headers.insert(index, name.to_string());
        for row in &mut self.rows {
            row.insert(index, value.to_string());
        }
        Ok(())
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, column: usize) -> Result<Vec<&str>, TableError> {
        self.check_column(column)?;
        Ok(self.rows.iter().map(|r| r[column].as_str()).collect())
    }

    /// Concatenate tables in order.
    ///
    /// The result's header is the union of all headers in first-seen order;
    /// a row from a table that lacks some column gets a blank cell there.
    /// Columns are matched by name and occurrence, so the second `Price` of a
    /// table only ever lines up with the second `Price` of the union.
    pub fn concat(tables: &[DayTable]) -> DayTable {
        let mut headers: Vec<String> = Vec::new();
        let mut mappings: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
        for table in tables {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            let mut mapping = Vec::with_capacity(table.headers.len());
            for h in &table.headers {
                let nth = seen.entry(h.as_str()).or_default();
                let slot = headers
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| *m == h)
                    .map(|(i, _)| i)
                    .nth(*nth);
                *nth += 1;
                let slot = match slot {
                    Some(i) => i,
                    None => {
                        headers.push(h.clone());
                        headers.len() - 1
                    }
                };
                mapping.push(slot);
            }
            mappings.push(mapping);
        }

        let total: usize = tables.iter().map(DayTable::row_count).sum();
        let mut rows = Vec::with_capacity(total);
        for (table, mapping) in tables.iter().zip(&mappings) {
            for row in &table.rows {
                let mut out = vec![String::new(); headers.len()];
                for (src, &dst) in mapping.iter().enumerate() {
                    out[dst] = row[src].clone();
                }
                rows.push(out);
            }
        }

        DayTable { headers, rows }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, TableError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        // csv::Writer only emits the UTF-8 strings it was given
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn check_column(&self, column: usize) -> Result<(), TableError> {
        if column >= self.headers.len() {
            return Err(TableError::NoSuchColumn {
                index: column,
                columns: self.headers.len(),
            });
        }
        Ok(())
    }
}
