//! Versioned JSON document store.
//!
//! Every persisted record (breaker state, failed-order queue, alert log,
//! scaling state) is a whole-document snapshot written through [`JsonStore`]:
//!
//! - Documents are wrapped in an envelope carrying `schema_version` and `saved_at`
//! - Writes go to a temporary sibling file, are fsynced, then renamed over the
//!   target, so a reader never observes a partial document
//! - Documents written before the envelope existed (bare JSON) load as
//!   version 0 and pass through [`Versioned::migrate`]
//! - Documents from a newer schema are rejected instead of being misparsed

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error reading/writing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document was written by a newer schema than this build understands.
    #[error("unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Older document could not be upgraded.
    #[error("migration from schema version {from} failed: {reason}")]
    Migration { from: u32, reason: String },
}

/// A persisted document type with an explicit schema version.
pub trait Versioned: Serialize + DeserializeOwned {
    /// Version written by this build.
    const SCHEMA_VERSION: u32;

    /// Upgrades a document written under an older `version`.
    ///
    /// Version 0 denotes a bare document with no envelope. The default
    /// implementation parses the payload as the current type, which is
    /// sufficient while every schema change only adds defaulted fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented in the current schema.
    fn migrate(version: u32, payload: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(payload).map_err(|e| StoreError::Migration {
            from: version,
            reason: e.to_string(),
        })
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    data: &'a T,
}

#[derive(Deserialize)]
struct RawEnvelope {
    schema_version: u32,
    #[allow(dead_code)]
    saved_at: Option<DateTime<Utc>>,
    data: serde_json::Value,
}

/// Reads and atomically rewrites one JSON document.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Versioned> JsonStore<T> {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, migrating older schemas.
    ///
    /// Returns `Ok(None)` when no document has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or from a newer schema.
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        let is_envelope = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("schema_version") && obj.contains_key("data"));

        let document = if is_envelope {
            let envelope: RawEnvelope = serde_json::from_value(value)?;
            match envelope.schema_version {
                v if v == T::SCHEMA_VERSION => serde_json::from_value(envelope.data)?,
                v if v > T::SCHEMA_VERSION => {
                    return Err(StoreError::UnsupportedVersion {
                        found: v,
                        supported: T::SCHEMA_VERSION,
                    });
                }
                v => T::migrate(v, envelope.data)?,
            }
        } else {
            T::migrate(0, value)?
        };

        debug!(path = %self.path.display(), "Loaded persisted document");
        Ok(Some(document))
    }

    /// Atomically replaces the document on disk.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn save(&self, document: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(
                &mut writer,
                &EnvelopeRef {
                    schema_version: T::SCHEMA_VERSION,
                    saved_at: Utc::now(),
                    data: document,
                },
            )?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "Saved persisted document");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ledger {
        entries: Vec<String>,
        #[serde(default)]
        owner: Option<String>,
    }

    impl Versioned for Ledger {
        const SCHEMA_VERSION: u32 = 2;
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Renamed {
        total: i64,
    }

    impl Versioned for Renamed {
        const SCHEMA_VERSION: u32 = 1;

        fn migrate(version: u32, payload: serde_json::Value) -> Result<Self, StoreError> {
            // v0 called the field "sum"
            let total = payload
                .get("sum")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| StoreError::Migration {
                    from: version,
                    reason: "missing sum".to_string(),
                })?;
            Ok(Self { total })
        }
    }

    fn temp_store<T: Versioned>() -> (TempDir, JsonStore<T>) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("doc.json"));
        (dir, store)
    }

    fn write_raw(path: &Path, body: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_loads_none() {
        let (_dir, store) = temp_store::<Ledger>();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_writes_envelope_and_reloads() {
        let (_dir, store) = temp_store::<Ledger>();
        let ledger = Ledger {
            entries: vec!["a".to_string(), "b".to_string()],
            owner: Some("ops".to_string()),
        };

        store.save(&ledger).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["schema_version"], 2);
        assert!(raw["saved_at"].is_string());
        assert_eq!(raw["data"]["entries"][1], "b");

        assert_eq!(store.load().unwrap(), Some(ledger));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (dir, store) = temp_store::<Ledger>();
        store
            .save(&Ledger {
                entries: vec![],
                owner: None,
            })
            .unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("doc.json")]);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join("doc.json");
        let store: JsonStore<Ledger> = JsonStore::new(path.clone());

        store
            .save(&Ledger {
                entries: vec![],
                owner: None,
            })
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_bare_legacy_document_is_migrated() {
        let (_dir, store) = temp_store::<Ledger>();
        write_raw(store.path(), r#"{"entries": ["legacy"]}"#);

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.entries, vec!["legacy".to_string()]);
        assert_eq!(loaded.owner, None);
    }

    #[test]
    fn test_custom_migration_renames_fields() {
        let (_dir, store) = temp_store::<Renamed>();
        write_raw(store.path(), r#"{"sum": 42}"#);

        assert_eq!(store.load().unwrap(), Some(Renamed { total: 42 }));
    }

    #[test]
    fn test_failed_migration_is_an_error() {
        let (_dir, store) = temp_store::<Renamed>();
        write_raw(store.path(), r#"{"total": 42}"#);

        assert!(matches!(
            store.load(),
            Err(StoreError::Migration { from: 0, .. })
        ));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let (_dir, store) = temp_store::<Ledger>();
        write_raw(
            store.path(),
            r#"{"schema_version": 9, "saved_at": "2026-01-01T00:00:00Z", "data": {"entries": []}}"#,
        );

        match store.load() {
            Err(StoreError::UnsupportedVersion { found, supported }) => {
                assert_eq!(found, 9);
                assert_eq!(supported, 2);
            }
            other => panic!("Expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = temp_store::<Ledger>();
        write_raw(store.path(), "not valid json {{{");

        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }
}
