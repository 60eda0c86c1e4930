//! Bounded, durable alert log
//!
//! Records are kept in insertion order, capped at `max_records`. Every
//! append rewrites the backing JSON file (temp file + rename) before
//! returning, so a crash never leaves a half-written log behind.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::AlertRecord;

/// Default retention count
pub const DEFAULT_MAX_RECORDS: usize = 250;

/// Alert store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing file for the alert log
    pub path: PathBuf,
    pub max_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("alerts.json"),
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// Errors surfaced by [`AlertStore::append`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to serialize alert log: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to persist alert log: {0:#}")]
    Persist(anyhow::Error),
}

/// Alert log shared by every scenario loop and the HTTP surface
#[derive(Debug)]
pub struct AlertStore {
    records: Mutex<VecDeque<AlertRecord>>,
    path: Option<PathBuf>,
    max_records: usize,
}

impl AlertStore {
    /// Open the store at `config.path`, loading existing records.
    ///
    /// A missing file is an empty store. An unreadable or corrupted file is
    /// logged and treated as empty; the next append overwrites it.
    pub fn open(config: &StoreConfig) -> Self {
        let mut records = VecDeque::new();

        if config.path.exists() {
            match load_from_disk(&config.path) {
                Ok(loaded) => {
                    records = loaded.into();
                    info!(path = %config.path.display(), entries = records.len(), "Loaded alert log");
                }
                Err(e) => {
                    warn!(path = %config.path.display(), error = %e, "Failed to load alert log, starting empty");
                }
            }
        }

        while records.len() > config.max_records {
            records.pop_front();
        }

        Self {
            records: Mutex::new(records),
            path: Some(config.path.clone()),
            max_records: config.max_records,
        }
    }

    /// Store without a backing file
    pub fn in_memory(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            path: None,
            max_records,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AlertRecord>> {
        // A panic while holding the lock cannot leave the deque inconsistent
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record, evicting the oldest beyond capacity, and persist.
    ///
    /// The in-memory log is updated even when persisting fails.
    pub fn append(&self, record: AlertRecord) -> Result<(), StoreError> {
        let mut records = self.lock();

        records.push_back(record);
        while records.len() > self.max_records {
            records.pop_front();
        }

        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(&*records)?;
        save_to_disk(path, &json).map_err(StoreError::Persist)?;
        debug!(path = %path.display(), entries = records.len(), "Alert log persisted");

        Ok(())
    }

    /// Records newer than `since` (strictly), or all records, in stored order
    pub fn list(&self, since: Option<DateTime<Utc>>) -> Vec<AlertRecord> {
        let records = self.lock();

        match since {
            Some(since) => records
                .iter()
                .filter(|r| r.timestamp > since)
                .cloned()
                .collect(),
            None => records.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_records
    }
}

fn save_to_disk(path: &Path, json: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(json).context("Failed to write alert log")?;
    file.sync_all().context("Failed to sync alert log")?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

fn load_from_disk(path: &Path) -> anyhow::Result<Vec<AlertRecord>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open alert log {:?}", path))?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .context("Failed to read alert log")?;

    serde_json::from_slice(&data).context("Failed to deserialize alert log")
}
