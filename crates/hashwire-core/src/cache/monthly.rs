//! Calendar-month cache for slow-changing extracted values.
//!
//! Entries are valid until the calendar month changes. With a backing file
//! the cache is written through on every insert and reloaded at startup, so
//! a restart within the month does not force re-extraction.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::Result;
use crate::metrics::METRICS;

/// A calendar month in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now())
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MonthlyEntry<V> {
    month: MonthKey,
    value: V,
}

pub struct MonthlyCache<V> {
    entries: Mutex<HashMap<String, MonthlyEntry<V>>>,
    backing_file: Option<PathBuf>,
    /// Held across snapshot and write so the file never goes back in time.
    write_lock: tokio::sync::Mutex<()>,
}

impl<V> Default for MonthlyCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            backing_file: None,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl<V> MonthlyCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// In-memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache persisted to `path`. An unreadable or corrupt file starts the cache empty.
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, MonthlyEntry<V>>>(&raw) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "monthly cache loaded");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "monthly cache file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            entries: Mutex::new(entries),
            backing_file: Some(path),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Value for `key` if it was stored during `month`.
    pub fn get(&self, key: &str, month: MonthKey) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.month == month => {
                METRICS.inc_cache_hits();
                Some(entry.value.clone())
            }
            _ => {
                METRICS.inc_cache_misses();
                None
            }
        }
    }

    /// Store `value` for `month`, writing the file off the async runtime.
    pub async fn insert(&self, key: impl Into<String>, value: V, month: MonthKey) -> Result<()> {
        let _writing = self.write_lock.lock().await;
        let bytes = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.insert(key.into(), MonthlyEntry { month, value });
            match &self.backing_file {
                Some(_) => Some(serde_json::to_vec_pretty(&*entries)?),
                None => None,
            }
        };
        let (Some(path), Some(bytes)) = (self.backing_file.clone(), bytes) else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        Ok(())
    }

    pub fn backing_file(&self) -> Option<&Path> {
        self.backing_file.as_deref()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
