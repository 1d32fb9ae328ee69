//! Persistent tracking records: when an item was last checked against a
//! repository and how that check ended.
//!
//! A tracking file is a JSON object mapping record keys to records:
//!
//! ```json
//! { "https://repo.example.com": { "last-updated": 1718445600000, "error": { "kind": "not-found", ... } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use arbor_util::errors::ArborError;
use serde::{Deserialize, Serialize};

use crate::transfer::TransferError;

/// When an item was last successfully updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastUpdated {
    /// No attempt was ever made.
    Never,
    /// Something was attempted but the time is not known.
    Unknown,
    At(i64),
}

impl LastUpdated {
    /// Epoch millis for policy evaluation. An unknown time counts as very old.
    pub fn millis(self) -> i64 {
        match self {
            Self::Never => 0,
            Self::Unknown => 1,
            Self::At(ms) => ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackingRecord {
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub error: Option<TransferError>,
}

impl TrackingRecord {
    pub fn new(last_updated: i64, error: Option<TransferError>) -> Self {
        Self {
            last_updated: Some(last_updated),
            error,
        }
    }
}

/// Storage for tracking records, keyed by tracking file and record key.
pub trait TrackingStore: Send + Sync {
    fn read(&self, file: &Path, key: &str) -> miette::Result<Option<TrackingRecord>>;

    /// Replace the record under `key`; `None` removes it.
    fn write(&self, file: &Path, key: &str, record: Option<TrackingRecord>) -> miette::Result<()>;
}

/// Tracking records in JSON files next to the tracked items. A file left
/// without records is deleted.
#[derive(Debug, Default)]
pub struct FileTrackingStore {
    lock: Mutex<()>,
}

type Records = BTreeMap<String, TrackingRecord>;

impl FileTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(file: &Path) -> miette::Result<Records> {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => {
                return Err(ArborError::Tracking {
                    message: format!("Failed to read {}: {e}", file.display()),
                }
                .into())
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!("Ignoring corrupt tracking file {}: {e}", file.display());
                Ok(Records::new())
            }
        }
    }
}

impl TrackingStore for FileTrackingStore {
    fn read(&self, file: &Path, key: &str) -> miette::Result<Option<TrackingRecord>> {
        let mut records = Self::load(file)?;
        Ok(records.remove(key))
    }

    fn write(&self, file: &Path, key: &str, record: Option<TrackingRecord>) -> miette::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut records = Self::load(file)?;
        match record {
            Some(record) => {
                records.insert(key.to_string(), record);
            }
            None => {
                records.remove(key);
            }
        }

        if records.is_empty() {
            return match std::fs::remove_file(file) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ArborError::Io(e).into()),
            };
        }
        let json = serde_json::to_string_pretty(&records).map_err(|e| ArborError::Tracking {
            message: format!("Failed to serialize {}: {e}", file.display()),
        })?;
        arbor_util::fs::write_file(file, json.as_bytes()).map_err(ArborError::Io)?;
        tracing::trace!("Updated tracking record {key} in {}", file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new();
        let record = store.read(&tmp.path().join("a.jar.lastUpdated"), "repo").unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn records_are_kept_per_key() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("nested/resolver-status.json");
        let store = FileTrackingStore::new();

        store
            .write(&file, "one", Some(TrackingRecord::new(10, None)))
            .unwrap();
        let failed = TrackingRecord::new(20, Some(TransferError::not_found("x", "two")));
        store.write(&file, "two", Some(failed.clone())).unwrap();

        assert_eq!(store.read(&file, "one").unwrap(), Some(TrackingRecord::new(10, None)));
        assert_eq!(store.read(&file, "two").unwrap(), Some(failed));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(json["one"]["last-updated"], 10);
        assert_eq!(json["two"]["error"]["kind"], "not-found");
    }

    #[test]
    fn removing_last_record_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.jar.lastUpdated");
        let store = FileTrackingStore::new();

        store.write(&file, "repo", Some(TrackingRecord::new(1, None))).unwrap();
        assert!(file.is_file());
        store.write(&file, "repo", None).unwrap();
        assert!(!file.exists());
        store.write(&file, "repo", None).unwrap();
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("resolver-status.json");
        std::fs::write(&file, "not json").unwrap();

        let store = FileTrackingStore::new();
        assert!(store.read(&file, "repo").unwrap().is_none());
        store.write(&file, "repo", Some(TrackingRecord::new(5, None))).unwrap();
        assert_eq!(store.read(&file, "repo").unwrap().unwrap().last_updated, Some(5));
    }

    #[test]
    fn last_updated_millis() {
        assert_eq!(LastUpdated::Never.millis(), 0);
        assert_eq!(LastUpdated::Unknown.millis(), 1);
        assert_eq!(LastUpdated::At(42).millis(), 42);
    }
}
