//! Local persistent key–value store.
//!
//! String values keyed by name, kept in a single JSON object on disk and
//! cached in memory. Writes go through a temp file and a rename so a crash
//! never leaves a half-written store behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::LocalStoreError;

const STORE_FILE: &str = "local_storage.json";

pub struct LocalStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    /// Open (or start) the store inside `dir`. An unreadable or corrupted
    /// store file is treated as empty.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(STORE_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Local store {} is corrupted ({e}), starting empty", path.display());
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        debug!("Opened local store at {}", path.display());

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// Store a value. The in-memory view only changes once the write
    /// has reached disk.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), LocalStoreError> {
        let mut entries = self.entries();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.into());
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.entries();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(entries)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
