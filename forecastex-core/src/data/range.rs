//! Inclusive calendar date ranges and the compact `YYYYMMDD` date label.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Format used for request parameters, cache filenames and the date label column.
pub const DATE_LABEL_FORMAT: &str = "%Y%m%d";

/// An ordered, inclusive run of calendar days (`start <= end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// Returned when a range would run backwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("start date {start} is after end date {end}")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
        if start > end {
            return Err(InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, both ends included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Never true; a valid range always holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate every day from `start` to `end`, ascending, without gaps.
    pub fn days(&self) -> DayIter {
        DayIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = DayIter;

    fn into_iter(self) -> Self::IntoIter {
        self.days()
    }
}

/// Day-by-day iterator over a [`DateRange`].
#[derive(Debug, Clone)]
pub struct DayIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add_days(Days::new(1))
        } else {
            None
        };
        Some(current)
    }
}

/// Compact `YYYYMMDD` label for a date.
pub fn date_label(date: NaiveDate) -> String {
    date.format(DATE_LABEL_FORMAT).to_string()
}

/// Parse a `YYYYMMDD` label back into a date.
///
/// Requires exactly eight ASCII digits that form a real calendar date.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    if label.len() != 8 || !label.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(label, DATE_LABEL_FORMAT).ok()
}
