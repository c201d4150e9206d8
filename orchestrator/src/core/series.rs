//! Source series and masked variants
//!
//! A [`SourceSeries`] is one subject's heart-rate file, kept in file order.
//! A [`Variant`] is the same rows with some heart-rate cells nulled out and a
//! `removed` flag marking which ones were masked.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;

use crate::error::{OrchestratorError, OrchestratorResult};
use shared::{SubjectId, UnitKey};

pub const USER_COLUMN: &str = "user";
pub const DATETIME_COLUMN: &str = "datetime";
pub const HEARTRATE_COLUMN: &str = "heartrate";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// One row of a heart-rate source file
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub user: String,
    pub datetime: String,
    pub heartrate: Option<f64>,
}

/// One subject's heart-rate series, immutable once read
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    subject: SubjectId,
    path: PathBuf,
    rows: Vec<SeriesRow>,
}

impl SourceSeries {
    pub fn new(subject: SubjectId, path: impl Into<PathBuf>, rows: Vec<SeriesRow>) -> Self {
        Self {
            subject,
            path: path.into(),
            rows,
        }
    }

    /// Read a `{subject}_hr.csv` file
    pub async fn read_csv(path: &Path) -> OrchestratorResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| OrchestratorError::malformed(path, "file name is not valid UTF-8"))?;
        let subject = SubjectId::from_file_name(file_name)
            .map_err(|e| OrchestratorError::malformed(path, e.to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| OrchestratorError::malformed(path, e.to_string()))?;
        Self::from_reader(subject, path, bytes.as_slice())
    }

    /// Parse CSV content; `path` is only used to label errors
    pub fn from_reader<R: Read>(subject: SubjectId, path: &Path, reader: R) -> OrchestratorResult<Self> {
        let mut csv_reader = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| OrchestratorError::malformed(path, e.to_string()))?
            .clone();

        let user_idx = column_index(&headers, USER_COLUMN, path)?;
        let datetime_idx = column_index(&headers, DATETIME_COLUMN, path)?;
        let heartrate_idx = column_index(&headers, HEARTRATE_COLUMN, path)?;

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| OrchestratorError::malformed(path, e.to_string()))?;
            let field = |idx: usize| record.get(idx).unwrap_or_default();
            let heartrate = parse_value(field(heartrate_idx)).ok_or_else(|| {
                OrchestratorError::malformed(
                    path,
                    format!("row {}: heartrate '{}' is not numeric", line + 1, field(heartrate_idx)),
                )
            })?;
            rows.push(SeriesRow {
                user: field(user_idx).to_string(),
                datetime: field(datetime_idx).to_string(),
                heartrate,
            });
        }

        Ok(Self::new(subject, path, rows))
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The primary (heart-rate) column
    pub fn values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.heartrate).collect()
    }

    /// Seconds since midnight for every row, derived from `datetime`
    pub fn time_of_day(&self) -> OrchestratorResult<Vec<f64>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                parse_time_of_day(&row.datetime).ok_or_else(|| {
                    OrchestratorError::malformed(
                        &self.path,
                        format!("row {}: cannot derive time of day from '{}'", idx + 1, row.datetime),
                    )
                })
            })
            .collect()
    }
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> OrchestratorResult<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| OrchestratorError::malformed(path, format!("missing required column '{name}'")))
}

/// `Some(None)` for an empty/NaN cell, `None` when the cell is not a number
fn parse_value(raw: &str) -> Option<Option<f64>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(None);
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}

fn parse_time_of_day(raw: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(f64::from(dt.num_seconds_from_midnight()));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| f64::from(dt.num_seconds_from_midnight()))
}

/// One row of a masked variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRow {
    pub user: String,
    pub datetime: String,
    pub heartrate: Option<f64>,
    pub removed: bool,
}

/// A source series after masking under one (mechanism, rate, iteration)
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    key: UnitKey,
    rows: Vec<VariantRow>,
}

/// A source row joined with its variant row on (datetime, user)
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub user: String,
    pub datetime: String,
    pub original: Option<f64>,
    pub masked: Option<f64>,
    pub removed: bool,
}

impl Variant {
    pub fn new(key: UnitKey, rows: Vec<VariantRow>) -> Self {
        Self { key, rows }
    }

    pub fn key(&self) -> &UnitKey {
        &self.key
    }

    pub fn rows(&self) -> &[VariantRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.removed).count()
    }

    /// Serialize as `user,datetime,heartrate,removed`; masked cells are empty
    pub fn to_csv_bytes(&self) -> OrchestratorResult<Vec<u8>> {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| OrchestratorError::IoError(e.into_error()))
    }

    /// Join back onto the source by (datetime, user)
    ///
    /// Repeated timestamps are paired in order of appearance, so a variant
    /// that neither drops nor duplicates rows merges one-to-one.
    pub fn merge_with(&self, source: &SourceSeries) -> Vec<MergedRow> {
        let mut by_key: HashMap<(&str, &str), VecDeque<&VariantRow>> = HashMap::new();
        for row in &self.rows {
            by_key
                .entry((row.datetime.as_str(), row.user.as_str()))
                .or_default()
                .push_back(row);
        }

        source
            .rows()
            .iter()
            .filter_map(|src| {
                let matched = by_key
                    .get_mut(&(src.datetime.as_str(), src.user.as_str()))
                    .and_then(|queue| queue.pop_front())?;
                Some(MergedRow {
                    user: src.user.clone(),
                    datetime: src.datetime.clone(),
                    original: src.heartrate,
                    masked: matched.heartrate,
                    removed: matched.removed,
                })
            })
            .collect()
    }
}
