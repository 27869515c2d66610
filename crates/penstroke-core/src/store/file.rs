use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::CredentialStore;

/// Storage file name in the data directory
const STORAGE_FILE: &str = "storage.json";

/// Store persisted as a single JSON object on disk.
///
/// Every mutation rewrites the file, so a value set before a restart is
/// visible after it. Disk failures are logged and the in-memory copy stays
/// authoritative for the rest of the process.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// A missing file starts empty. An unreadable or corrupt file also starts
    /// empty (with a warning); it is overwritten on the next write.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        let path = dir.join(STORAGE_FILE);
        let entries = Self::read_entries(&path);
        debug!(path = %path.display(), keys = entries.len(), "File store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return BTreeMap::new();
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read storage file");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Storage file is corrupt, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(entries)
            .map_err(anyhow::Error::from)
            .and_then(|contents| std::fs::write(&self.path, contents).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!(error = %e, path = %self.path.display(), "Failed to write storage file");
        }
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}
