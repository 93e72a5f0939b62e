//! CSV bar files: layout detection, row parsing, incremental reading.
//!
//! Two layouts are recognized from the header row:
//! - columnar: `Open, High, Low, Close, Volume, Date, Time`
//! - timestamp-first: `timestamp, open, high, low, close, volume`
//!
//! Columns are located by name (case-insensitive), so column order within a
//! layout does not matter.

use super::error::FileIssue;
use crate::domain::{BarError, PriceBar};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "datetime", "date", "time"];

/// Column positions for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Columnar {
        open: usize,
        high: usize,
        low: usize,
        close: usize,
        volume: usize,
        date: usize,
        time: usize,
        width: usize,
    },
    TimestampFirst {
        timestamp: usize,
        open: usize,
        high: usize,
        low: usize,
        close: usize,
        volume: usize,
        width: usize,
    },
}

impl Layout {
    /// Detect the layout from a header row.
    pub fn detect(headers: &StringRecord) -> Result<Self, FileIssue> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let width = names.len();

        let ohlcv = (
            find("open"),
            find("high"),
            find("low"),
            find("close"),
            find("volume"),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = ohlcv else {
            return Err(FileIssue::UnknownLayout(names.join(",")));
        };

        if let (Some(date), Some(time)) = (find("date"), find("time")) {
            return Ok(Layout::Columnar {
                open,
                high,
                low,
                close,
                volume,
                date,
                time,
                width,
            });
        }

        TIMESTAMP_COLUMNS
            .iter()
            .find_map(|c| find(c))
            .map(|timestamp| Layout::TimestampFirst {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
                width,
            })
            .ok_or_else(|| FileIssue::UnknownLayout(names.join(",")))
    }

    fn width(&self) -> usize {
        match *self {
            Layout::Columnar { width, .. } | Layout::TimestampFirst { width, .. } => width,
        }
    }
}

/// Why a single data row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("cannot parse {column} value {value:?}")]
    Number { column: &'static str, value: String },

    #[error("cannot parse timestamp {0:?}")]
    Timestamp(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("validation failed: {0}")]
    Invalid(#[from] BarError),
}

/// Parse one data row according to `layout`.
pub fn parse_row(layout: &Layout, record: &StringRecord) -> Result<PriceBar, RowError> {
    if record.len() != layout.width() {
        return Err(RowError::ColumnCount {
            expected: layout.width(),
            found: record.len(),
        });
    }
    let cell = |i: usize| record.get(i).unwrap_or("");

    let (timestamp, open, high, low, close, volume) = match *layout {
        Layout::Columnar {
            open,
            high,
            low,
            close,
            volume,
            date,
            time,
            ..
        } => (
            parse_date_time(cell(date), cell(time))?,
            open,
            high,
            low,
            close,
            volume,
        ),
        Layout::TimestampFirst {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            ..
        } => (parse_timestamp(cell(timestamp))?, open, high, low, close, volume),
    };

    let bar = PriceBar::new(
        timestamp,
        number("open", cell(open))?,
        number("high", cell(high))?,
        number("low", cell(low))?,
        number("close", cell(close))?,
        number("volume", cell(volume))?,
    )?;
    Ok(bar)
}

fn number(column: &'static str, value: &str) -> Result<f64, RowError> {
    value.trim().parse::<f64>().map_err(|_| RowError::Number {
        column,
        value: value.to_string(),
    })
}

/// Combine separate date and time cells (`4/1/25` + `9:30:00`).
pub fn parse_date_time(date: &str, time: &str) -> Result<NaiveDateTime, RowError> {
    let date_str = date.trim();
    let time_str = time.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date_str, f).ok())
        .ok_or_else(|| RowError::Timestamp(format!("{date_str} {time_str}")))?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(time_str, f).ok())
        .ok_or_else(|| RowError::Timestamp(format!("{date_str} {time_str}")))?;
    Ok(date.and_time(time))
}

/// Parse a single timestamp cell; a bare date means midnight.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, RowError> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| RowError::Timestamp(value.to_string()))
}

/// Per-file ingestion statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStats {
    pub path: PathBuf,
    pub symbol: String,
    /// Data rows read (header excluded).
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    /// True when the per-file row cap stopped ingestion early.
    pub truncated: bool,
}

/// An open bar file that can be read in bounded row ranges.
pub struct BarFile {
    reader: csv::Reader<File>,
    layout: Layout,
    record: StringRecord,
    row_cap: Option<usize>,
    exhausted: bool,
    stats: FileStats,
}

impl BarFile {
    /// Open `path`, read its header and detect the layout.
    ///
    /// `row_cap` bounds the number of *valid* rows ever returned from this file.
    pub fn open(path: &Path, symbol: &str, row_cap: Option<usize>) -> Result<Self, FileIssue> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| FileIssue::Open(e.to_string()))?;
        let headers = reader
            .headers()
            .map_err(|e| FileIssue::Open(e.to_string()))?
            .clone();
        let layout = Layout::detect(&headers)?;

        Ok(Self {
            reader,
            layout,
            record: StringRecord::new(),
            row_cap,
            exhausted: false,
            stats: FileStats {
                path: path.to_path_buf(),
                symbol: symbol.to_string(),
                ..FileStats::default()
            },
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn symbol(&self) -> &str {
        &self.stats.symbol
    }

    pub fn stats(&self) -> &FileStats {
        &self.stats
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Read up to `max_rows` raw data rows (all remaining rows if `None`),
    /// returning the bars that pass validation, in file order.
    pub fn read_rows(&mut self, max_rows: Option<usize>) -> Vec<PriceBar> {
        let mut bars = Vec::new();
        let mut consumed = 0usize;

        while !self.exhausted && max_rows.map_or(true, |m| consumed < m) {
            if self.cap_reached() {
                self.exhausted = true;
                // Only a record past the cap makes the file truncated.
                let more = match self.reader.read_record(&mut self.record) {
                    Ok(more) => more,
                    Err(e) => !e.is_io_error(),
                };
                if more {
                    self.stats.truncated = true;
                    tracing::info!(
                        file = %self.stats.path.display(),
                        symbol = %self.stats.symbol,
                        cap = ?self.row_cap,
                        "reached row limit, truncating"
                    );
                }
                break;
            }

            let row = match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    consumed += 1;
                    self.stats.rows_read += 1;
                    parse_row(&self.layout, &self.record)
                }
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) if e.is_io_error() => {
                    tracing::warn!(file = %self.stats.path.display(), error = %e, "read error, abandoning file");
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    consumed += 1;
                    self.stats.rows_read += 1;
                    Err(RowError::Malformed(e.to_string()))
                }
            };

            match row {
                Ok(bar) => {
                    self.stats.rows_accepted += 1;
                    bars.push(bar);
                }
                Err(e) => {
                    self.stats.rows_rejected += 1;
                    tracing::debug!(
                        file = %self.stats.path.display(),
                        row = self.stats.rows_read + 1,
                        error = %e,
                        "skipping row"
                    );
                }
            }
        }

        bars
    }

    fn cap_reached(&self) -> bool {
        self.row_cap
            .is_some_and(|cap| self.stats.rows_accepted >= cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn headers(cols: &[&str]) -> StringRecord {
        StringRecord::from(cols.to_vec())
    }

    #[test]
    fn detects_columnar_layout() {
        let layout =
            Layout::detect(&headers(&["Open", "High", "Low", "Close", "Volume", "Date", "Time"]))
                .unwrap();
        assert!(matches!(layout, Layout::Columnar { date: 5, time: 6, .. }));
    }

    #[test]
    fn detects_timestamp_first_layout() {
        let layout =
            Layout::detect(&headers(&["timestamp", "open", "high", "low", "close", "volume"]))
                .unwrap();
        assert!(matches!(layout, Layout::TimestampFirst { timestamp: 0, .. }));
    }

    #[test]
    fn rejects_unknown_header() {
        let err = Layout::detect(&headers(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, FileIssue::UnknownLayout(_)));
    }

    #[test]
    fn parses_short_us_dates() {
        let ts = parse_date_time("4/1/25", "9:30:00").unwrap();
        assert_eq!(ts.to_string(), "2025-04-01 09:30:00");
    }

    #[test]
    fn parses_four_digit_us_dates() {
        let ts = parse_date_time("04/01/2025", "09:30").unwrap();
        assert_eq!(ts.to_string(), "2025-04-01 09:30:00");
    }

    #[test]
    fn parses_iso_timestamp_and_bare_date() {
        assert_eq!(
            parse_timestamp("2024-03-05 13:00:01").unwrap().to_string(),
            "2024-03-05 13:00:01"
        );
        assert_eq!(
            parse_timestamp("2024-03-05").unwrap().to_string(),
            "2024-03-05 00:00:00"
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn row_with_bad_relationship_is_rejected() {
        let layout =
            Layout::detect(&headers(&["Open", "High", "Low", "Close", "Volume", "Date", "Time"]))
                .unwrap();
        let record = StringRecord::from(vec!["10", "9", "11", "10", "5", "4/1/25", "9:30:00"]);
        let err = parse_row(&layout, &record).unwrap_err();
        assert!(matches!(err, RowError::Invalid(BarError::HighBelowLow { .. })));
    }

    #[test]
    fn row_with_wrong_width_is_rejected() {
        let layout =
            Layout::detect(&headers(&["timestamp", "open", "high", "low", "close", "volume"]))
                .unwrap();
        let record = StringRecord::from(vec!["2024-01-01", "1", "2"]);
        assert!(matches!(
            parse_row(&layout, &record),
            Err(RowError::ColumnCount { expected: 6, found: 3 })
        ));
    }

    #[test]
    fn reads_in_bounded_ranges_and_honours_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        for i in 0..6 {
            writeln!(file, "2024-01-01 00:00:0{i},10,11,9,10,100").unwrap();
        }
        writeln!(file, "garbage,row").unwrap();
        file.flush().unwrap();

        let mut bar_file = BarFile::open(file.path(), "X", Some(5)).unwrap();
        assert_eq!(bar_file.read_rows(Some(2)).len(), 2);
        assert!(!bar_file.is_exhausted());
        assert_eq!(bar_file.read_rows(None).len(), 3);
        assert!(bar_file.is_exhausted());
        assert!(bar_file.stats().truncated);
        assert_eq!(bar_file.stats().rows_accepted, 5);
        assert_eq!(bar_file.stats().rows_rejected, 0);
    }

    #[test]
    fn file_ending_exactly_at_cap_is_not_truncated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        for i in 0..4 {
            writeln!(file, "2024-01-01 00:00:0{i},10,11,9,10,100").unwrap();
        }
        file.flush().unwrap();

        let mut bar_file = BarFile::open(file.path(), "X", Some(4)).unwrap();
        assert_eq!(bar_file.read_rows(Some(4)).len(), 4);
        assert!(bar_file.read_rows(Some(4)).is_empty());
        assert!(bar_file.is_exhausted());
        assert!(!bar_file.stats().truncated);
        assert_eq!(bar_file.stats().rows_read, 4);
    }
}
