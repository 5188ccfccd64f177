//! Local draft of an unnamed worksheet.
//!
//! One slot per user, keyed `capabilityWorksheetDraft:v1:user:{id}`. The
//! draft only exists while no named scenario is bound; it is the fallback
//! when there is nothing on the server to save into.
//!
//! Storage failures never escape this module: `persist` and `clear`
//! report a bool, `restore` reports `None`.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const KEY_PREFIX: &str = "capabilityWorksheetDraft:v1:user:";

/// Stable stand-in when no user id is known.
pub const DEFAULT_USER: &str = "default";

/// Storage key for a user's draft.
pub fn draft_key(user_id: Option<i64>) -> String {
    match user_id {
        Some(id) => format!("{}{}", KEY_PREFIX, id),
        None => format!("{}{}", KEY_PREFIX, DEFAULT_USER),
    }
}

/// Stored draft payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub active_capability_ids: Vec<String>,
    #[serde(default)]
    pub active_control_ids: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn is_empty(&self) -> bool {
        self.active_capability_ids.is_empty() && self.active_control_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backing store can't be used at all
    Unavailable(String),
    /// Write rejected for size
    QuotaExceeded { needed: usize, quota: usize },
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageError::QuotaExceeded { needed, quota } => {
                write!(f, "Storage quota exceeded ({} bytes, quota {})", needed, quota)
            }
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
            StorageError::Serialize(msg) => write!(f, "Serialize error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// String key-value store backing drafts.
pub trait DraftStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl DraftStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", self.dir.display(), e)))?;

        // Atomic: write .tmp then rename
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Io(e.to_string())
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

/// In-process store with an optional per-value size quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Write a raw value, bypassing the quota.
    pub fn insert_raw(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl DraftStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    quota,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Single-slot draft persistence for one user.
pub struct DraftStore {
    storage: Box<dyn DraftStorage>,
    key: String,
}

impl DraftStore {
    pub fn new(storage: Box<dyn DraftStorage>, user_id: Option<i64>) -> Self {
        Self {
            storage,
            key: draft_key(user_id),
        }
    }

    /// File-backed store under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>, user_id: Option<i64>) -> Self {
        Self::new(Box::new(FileStorage::new(dir)), user_id)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the current sets. Returns false (and logs) on any failure.
    pub fn persist(&mut self, capabilities: &BTreeSet<String>, controls: &BTreeSet<String>) -> bool {
        self.persist_at(capabilities, controls, Utc::now())
    }

    pub fn persist_at(
        &mut self,
        capabilities: &BTreeSet<String>,
        controls: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let draft = Draft {
            active_capability_ids: capabilities.iter().cloned().collect(),
            active_control_ids: controls.iter().cloned().collect(),
            updated_at: Some(now),
        };

        let result = serde_json::to_string(&draft)
            .map_err(|e| StorageError::Serialize(e.to_string()))
            .and_then(|json| self.storage.set(&self.key, &json));

        match result {
            Ok(()) => {
                log::debug!(
                    "draft saved: {} capabilities, {} controls",
                    draft.active_capability_ids.len(),
                    draft.active_control_ids.len()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save draft {}: {}", self.key, e);
                false
            }
        }
    }

    /// Read the draft back. Missing, unreadable or corrupt data gives `None`.
    pub fn restore(&self) -> Option<Draft> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read draft {}: {}", self.key, e);
                return None;
            }
        };

        match serde_json::from_str::<Draft>(&raw) {
            Ok(mut draft) => {
                draft.active_capability_ids.retain(|id| !id.trim().is_empty());
                draft.active_control_ids.retain(|id| !id.trim().is_empty());
                Some(draft)
            }
            Err(e) => {
                log::warn!("Ignoring corrupt draft {}: {}", self.key, e);
                None
            }
        }
    }

    pub fn clear(&mut self) -> bool {
        match self.storage.remove(&self.key) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to clear draft {}: {}", self.key, e);
                false
            }
        }
    }
}
