//! Persisted ledger of completed transfers.
//!
//! Maps a logical download key (the URL) to the completed file's path so a
//! repeat `start()` can short-circuit without re-enqueuing. Only existence
//! is ever checked against the recorded path; the ledger carries no
//! integrity information.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DownloadError, DownloadResult};

/// On-disk shape of the ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    entries: HashMap<String, PathBuf>,
}

/// Small key-value record of completed downloads, backed by a JSON file.
pub struct CompletedStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, PathBuf>>,
}

impl CompletedStore {
    /// Open the ledger at the given path.
    ///
    /// A missing or unreadable file yields an empty ledger - the record is
    /// an optimization, never a source of truth.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<LedgerFile>(&raw) {
                Ok(ledger) => ledger.entries,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "ignoring corrupt ledger");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Recorded completed path for a key, if any.
    pub fn get(&self, key: &str) -> Option<PathBuf> {
        self.entries.lock().get(key).cloned()
    }

    /// Record a completed transfer and persist the ledger.
    pub fn put(&self, key: &str, file_path: &Path) -> DownloadResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), file_path.to_path_buf());
        self.persist(&entries)
    }

    /// Forget a key and persist the ledger.
    pub fn remove(&self, key: &str) -> DownloadResult<()> {
        let mut entries = self.entries.lock();
        entries.remove(key);
        self.persist(&entries)
    }

    fn persist(&self, entries: &HashMap<String, PathBuf>) -> DownloadResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DownloadError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let ledger = LedgerFile {
            entries: entries.clone(),
        };
        let raw = serde_json::to_string_pretty(&ledger)
            .map_err(|e| DownloadError::Unknown(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| DownloadError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}
