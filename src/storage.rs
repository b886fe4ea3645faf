// file: src/storage.rs
// description: named-record durable storage backing the drop history

use crate::error::LiveDropsError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Per-device key/value storage that survives restarts.
///
/// Reads and writes are synchronous and local; callers treat them as
/// non-suspending.
pub trait DurableStorage: Send + Sync {
    /// Returns `Ok(None)` when the record has never been written.
    fn get(&self, record: &str) -> Result<Option<String>, LiveDropsError>;
    fn set(&self, record: &str, value: &str) -> Result<(), LiveDropsError>;
}

/// One `<record>.json` file per record inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, record: &str) -> PathBuf {
        self.dir.join(format!("{record}.json"))
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, record: &str) -> Result<Option<String>, LiveDropsError> {
        let path = self.path_for(record);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, record: &str, value: &str) -> Result<(), LiveDropsError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(record);
        // write-then-rename so a crash mid-write leaves the previous record intact
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, record: &str) -> Result<Option<String>, LiveDropsError> {
        Ok(self.records().get(record).cloned())
    }

    fn set(&self, record: &str, value: &str) -> Result<(), LiveDropsError> {
        self.records().insert(record.to_string(), value.to_string());
        Ok(())
    }
}
