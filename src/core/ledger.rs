//! Transaction rows of a single account and the filters applied to them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// One record of the transaction log.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    /// `None` when the cell could not be read as a date.
    pub create_date: Option<NaiveDateTime>,
    pub description: String,
    pub uid: String,
    pub raw_amount: String,
}

/// Reasons a transaction log is refused before any aggregation happens.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Multiple UIDs found, expected only one UID: {}", .0.join(", "))]
    MultipleAccounts(Vec<String>),

    #[error("No UID found in {0}")]
    NoAccount(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

/// The rows of one transaction log, all belonging to the same account.
#[derive(Debug, Clone)]
pub struct Ledger {
    source: PathBuf,
    uid: String,
    rows: Vec<TransactionRow>,
}

impl Ledger {
    /// Validates that `rows` reference exactly one account id.
    ///
    /// Blank id cells are ignored for the check.
    pub fn new(source: impl Into<PathBuf>, rows: Vec<TransactionRow>) -> Result<Self, LedgerError> {
        let source = source.into();
        let mut uids: Vec<&str> = Vec::new();
        for row in &rows {
            let uid = row.uid.trim();
            if !uid.is_empty() && !uids.contains(&uid) {
                uids.push(uid);
            }
        }

        match uids.as_slice() {
            [] => Err(LedgerError::NoAccount(source.display().to_string())),
            [uid] => {
                let uid = uid.to_string();
                debug!(rows = rows.len(), %uid, "Loaded ledger");
                Ok(Self { source, uid, rows })
            }
            many => Err(LedgerError::MultipleAccounts(
                many.iter().map(|u| u.to_string()).collect(),
            )),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn rows(&self) -> &[TransactionRow] {
        &self.rows
    }
}

/// Earliest and latest parseable dates among `rows`.
pub fn time_frame<'a, I>(rows: I) -> Option<(NaiveDateTime, NaiveDateTime)>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    rows.into_iter()
        .filter_map(|row| row.create_date)
        .fold(None, |frame, date| match frame {
            None => Some((date, date)),
            Some((min, max)) => Some((min.min(date), max.max(date))),
        })
}

/// Rows whose description is one of `allowed`, compared exactly.
pub fn filter_by_category<'a, I>(rows: I, allowed: &[String]) -> Vec<&'a TransactionRow>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    rows.into_iter()
        .filter(|row| allowed.iter().any(|label| *label == row.description))
        .collect()
}

/// Rows whose description equals `description`.
pub fn filter_by_description<'a, I>(rows: I, description: &str) -> Vec<&'a TransactionRow>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    rows.into_iter()
        .filter(|row| row.description == description)
        .collect()
}

/// Rows created inside `range`. Rows without a date never match.
pub fn filter_by_date_range<'a, I>(rows: I, range: &DateRange) -> Vec<&'a TransactionRow>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    rows.into_iter()
        .filter(|row| row.create_date.is_some_and(|date| range.contains(date)))
        .collect()
}

#[derive(Debug, Error, PartialEq)]
pub enum DateRangeError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    Invalid(String),
}

/// An inclusive window of creation timestamps.
///
/// A window whose start is after its end is valid and selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Parses user-entered bounds. A date without a time means midnight.
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        Ok(Self::new(parse_bound(start)?, parse_bound(end)?))
    }

    pub fn contains(&self, date: NaiveDateTime) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", Bound(self.start), Bound(self.end))
    }
}

/// Midnight bounds print as plain dates.
struct Bound(NaiveDateTime);

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.time() == NaiveTime::MIN {
            write!(f, "{}", self.0.date())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn parse_bound(input: &str) -> Result<NaiveDateTime, DateRangeError> {
    let input = input.trim();
    if let Some(date) = parse_date(input) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    parse_datetime(input).ok_or_else(|| DateRangeError::Invalid(input.to_string()))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

fn parse_date(input: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Lenient timestamp parsing for log cells. Returns `None` rather than failing.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    parse_datetime(input).or_else(|| parse_date(input).map(|d| d.and_time(NaiveTime::MIN)))
}
