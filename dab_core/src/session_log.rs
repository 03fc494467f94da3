//! Session log: completed sessions in a single CSV file.
//!
//! Records are kept in append order; a record's position is its only key.
//! Appends add one row. Rating updates and deletes load every row, change
//! the in-memory list, and rewrite the file through a temp file that is
//! renamed over the original. There is no locking: one process, one writer.
//!
//! Row indices are only meaningful between a `load_all` and the mutation
//! that follows it.

use crate::types::TIMESTAMP_FORMAT;
use crate::{Error, Rating, Result, SessionRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Column names, in file order
pub const HEADER: [&str; 8] = [
    "timestamp",
    "material",
    "style",
    "wax",
    "intensity",
    "heat_s",
    "cool_s",
    "rating",
];

/// Session sink trait for persisting completed sessions
pub trait SessionSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;
}

/// A row in the CSV file
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    material: String,
    style: String,
    wax: String,
    intensity: String,
    heat_s: u32,
    cool_s: u32,
    rating: Option<u8>,
}

impl From<&SessionRecord> for CsvRow {
    fn from(record: &SessionRecord) -> Self {
        CsvRow {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            material: record.material.clone(),
            style: record.style.clone(),
            wax: record.wax.clone(),
            intensity: format!("{:.1}", record.intensity),
            heat_s: record.heat_seconds,
            cool_s: record.cool_seconds,
            rating: record.rating.map(u8::from),
        }
    }
}

impl TryFrom<CsvRow> for SessionRecord {
    type Error = String;

    fn try_from(row: CsvRow) -> std::result::Result<Self, String> {
        let timestamp = row
            .timestamp
            .parse::<NaiveDateTime>()
            .map_err(|e| format!("invalid timestamp '{}': {}", row.timestamp, e))?;

        let intensity = row
            .intensity
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid intensity '{}': {}", row.intensity, e))?;

        let rating = row
            .rating
            .map(Rating::try_from)
            .transpose()
            .map_err(|e| e.to_string())?;

        Ok(SessionRecord {
            timestamp,
            material: row.material,
            style: row.style,
            wax: row.wax,
            intensity,
            heat_seconds: row.heat_s,
            cool_seconds: row.cool_s,
            rating,
        })
    }
}

/// CSV-backed session log at a fixed path
#[derive(Clone, Debug)]
pub struct CsvSessionLog {
    path: PathBuf,
}

impl CsvSessionLog {
    /// Create a log handle for the given path; nothing is touched on disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the log, `.` for bare file names
    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        std::fs::create_dir_all(self.parent_dir())?;
        Ok(())
    }

    /// Read every record in append order
    ///
    /// A missing or zero-length file is an empty log; a file that exists but
    /// cannot be read is `StorageUnavailable`. Any unparseable row fails the whole
    /// load, since skipping it would shift the indices of later rows.
    pub fn load_all(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            tracing::debug!("No session log at {:?}", self.path);
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;

        // Read errors on the header must surface; `deserialize` would drop them
        let header = reader.headers()?.clone();
        if header.is_empty() {
            tracing::debug!("Session log {:?} is empty", self.path);
            return Ok(Vec::new());
        }
        if header.iter().ne(HEADER) {
            return Err(Error::UnexpectedHeader(header.iter().collect::<Vec<_>>().join(",")));
        }

        let mut records = Vec::new();
        for (row, result) in reader.deserialize::<CsvRow>().enumerate() {
            let csv_row = result.map_err(|e| {
                if e.is_io_error() {
                    Error::from(e)
                } else {
                    Error::CorruptRecord {
                        row,
                        reason: e.to_string(),
                    }
                }
            })?;
            let record = SessionRecord::try_from(csv_row)
                .map_err(|reason| Error::CorruptRecord { row, reason })?;
            records.push(record);
        }

        tracing::debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Fetch one record by position
    pub fn get(&self, index: usize) -> Result<SessionRecord> {
        let mut records = self.load_all()?;
        let len = records.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        Ok(records.swap_remove(index))
    }

    /// Set the rating of the record at `index`
    pub fn update_rating(&self, index: usize, rating: Rating) -> Result<()> {
        self.set_rating(index, Some(rating))
    }

    /// Remove the rating of the record at `index`
    pub fn clear_rating(&self, index: usize) -> Result<()> {
        self.set_rating(index, None)
    }

    fn set_rating(&self, index: usize, rating: Option<Rating>) -> Result<()> {
        let mut records = self.load_all()?;
        let len = records.len();
        let record = records
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        record.rating = rating;

        self.rewrite(&records)?;
        tracing::info!("Set rating of record {} to {:?}", index, rating.map(u8::from));
        Ok(())
    }

    /// Remove the record at `index`; later records move down by one
    pub fn delete(&self, index: usize) -> Result<SessionRecord> {
        let mut records = self.load_all()?;
        let len = records.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let removed = records.remove(index);

        self.rewrite(&records)?;
        tracing::info!("Deleted record {} ({})", index, removed.timestamp);
        Ok(removed)
    }

    /// Replace the file contents with `records`
    ///
    /// Writes header and rows to a temp file in the same directory, syncs
    /// it, then renames it over the log.
    fn rewrite(&self, records: &[SessionRecord]) -> Result<()> {
        self.ensure_parent_dir()?;

        let temp = NamedTempFile::new_in(self.parent_dir())?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(temp.as_file());
            writer.write_record(HEADER)?;
            for record in records {
                writer.serialize(CsvRow::from(record))?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        temp.persist(&self.path)
            .map_err(|e| Error::StorageUnavailable(e.error))?;

        tracing::debug!("Rewrote {:?} with {} records", self.path, records.len());
        Ok(())
    }
}

impl SessionSink for CsvSessionLog {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // A new or empty file gets the header row first
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        writer.serialize(CsvRow::from(record))?;
        writer.flush()?;
        file.sync_all()?;

        tracing::info!("Appended session {} to {:?}", record.timestamp, self.path);
        Ok(())
    }
}
