use chrono::{DateTime, Local};
use csv::{ReaderBuilder, WriterBuilder};
use shared::HistoryRecord;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Format of the `Date` column.
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Append-only CSV history of analyses.
///
/// All writers in the process go through one lock so rows from concurrent
/// sessions never interleave.
#[derive(Clone)]
pub struct HistoryLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn is_empty_or_missing(&self) -> Result<bool, LedgerError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().map_err(|_| LedgerError::LockPoisoned)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let write_header = self.is_empty_or_missing()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        log::debug!("Appended history record to {}", self.path.display());
        Ok(())
    }

    /// All records in insertion order. A missing or empty file is an empty history.
    pub fn load_all(&self) -> Result<Vec<HistoryRecord>, LedgerError> {
        let _guard = self.lock.lock().map_err(|_| LedgerError::LockPoisoned)?;

        if self.is_empty_or_missing()? {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<HistoryRecord>, csv::Error>>()?;
        Ok(records)
    }
}
