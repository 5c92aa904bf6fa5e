//! Bulk export, import and wipe of all persisted collections.
//!
//! An export document carries each collection's raw stored text, so an
//! export followed by an import reproduces the stored blobs byte for byte.

use crate::config::StorageConfig;
use crate::persist::{keys, KeyValueStore, PersistError};
use crate::world::now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Current export document version.
pub const BACKUP_VERSION: u32 = 1;

/// A full export of the persisted state.
///
/// Each collection field holds the raw stored text, or `None` when the
/// collection was never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: Option<String>,
    #[serde(default)]
    pub scenarios: Option<String>,
    #[serde(default)]
    pub characters: Option<String>,
    #[serde(default)]
    pub current_game: Option<String>,
    #[serde(default)]
    pub saved_games: Option<String>,
}

impl BackupDocument {
    fn slot(&self, collection: &str) -> Option<&String> {
        match collection {
            keys::SETTINGS => self.settings.as_ref(),
            keys::SCENARIOS => self.scenarios.as_ref(),
            keys::CHARACTERS => self.characters.as_ref(),
            keys::CURRENT_GAME => self.current_game.as_ref(),
            keys::SAVED_GAMES => self.saved_games.as_ref(),
            _ => None,
        }
    }

    fn slot_mut(&mut self, collection: &str) -> Option<&mut Option<String>> {
        match collection {
            keys::SETTINGS => Some(&mut self.settings),
            keys::SCENARIOS => Some(&mut self.scenarios),
            keys::CHARACTERS => Some(&mut self.characters),
            keys::CURRENT_GAME => Some(&mut self.current_game),
            keys::SAVED_GAMES => Some(&mut self.saved_games),
            _ => None,
        }
    }

    /// Collections present in this document, as `(base name, text)`.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        keys::ALL
            .into_iter()
            .filter_map(|c| self.slot(c).map(|text| (c, text.as_str())))
    }
}

/// Export/import over all five collections.
#[derive(Clone)]
pub struct Backup {
    backend: Arc<dyn KeyValueStore>,
    config: StorageConfig,
}

impl Backup {
    /// Create an exporter over `backend` using the keys from `config`.
    pub fn new(backend: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    /// Snapshot every collection's raw text.
    pub fn export(&self) -> Result<BackupDocument, PersistError> {
        let mut document = BackupDocument {
            version: BACKUP_VERSION,
            exported_at: Some(now()),
            ..Default::default()
        };

        for collection in keys::ALL {
            let text = self.backend.get(&self.config.key(collection))?;
            if let Some(slot) = document.slot_mut(collection) {
                *slot = text;
            }
        }
        Ok(document)
    }

    /// Export as a pretty-printed JSON document.
    pub fn export_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(&self.export()?)?)
    }

    /// Import a JSON export document.
    ///
    /// Every collection present in the document overwrites the stored blob
    /// verbatim; absent collections are left alone. Returns `false` without
    /// writing anything when the document, or any blob in it, is not valid
    /// JSON.
    pub fn import_json(&self, text: &str) -> bool {
        let document: BackupDocument = match serde_json::from_str(text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "rejected backup: malformed document");
                return false;
            }
        };
        self.import(&document)
    }

    /// Import an already-parsed document. See [`import_json`](Self::import_json).
    ///
    /// If the backend fails part way, collections already written are put
    /// back to their previous text before returning `false`.
    pub fn import(&self, document: &BackupDocument) -> bool {
        for (collection, blob) in document.present() {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(blob) {
                warn!(collection, error = %e, "rejected backup: malformed collection");
                return false;
            }
        }

        let mut previous = Vec::new();
        for (collection, _) in document.present() {
            match self.backend.get(&self.config.key(collection)) {
                Ok(text) => previous.push((collection, text)),
                Err(e) => {
                    warn!(collection, error = %e, "backup import failed while reading");
                    return false;
                }
            }
        }

        let mut written = Vec::new();
        for (collection, blob) in document.present() {
            if let Err(e) = self.backend.set(&self.config.key(collection), blob) {
                warn!(collection, written = written.len(), error = %e, "backup import failed while writing");
                self.restore(&previous, &written);
                return false;
            }
            written.push(collection);
        }

        info!(collections = written.len(), "imported backup");
        true
    }

    /// Put `written` collections back to their `previous` text.
    fn restore(&self, previous: &[(&'static str, Option<String>)], written: &[&'static str]) {
        for (collection, text) in previous.iter().filter(|(c, _)| written.contains(c)) {
            let key = self.config.key(collection);
            let result = match text {
                Some(text) => self.backend.set(&key, text),
                None => self.backend.remove(&key),
            };
            if let Err(e) = result {
                warn!(collection = *collection, error = %e, "could not restore collection");
            }
        }
    }

    /// Remove all five collections.
    pub fn clear_all(&self) -> Result<(), PersistError> {
        for collection in keys::ALL {
            self.backend.remove(&self.config.key(collection))?;
        }
        info!("cleared all persisted data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    fn backup() -> (Arc<MemoryStore>, Backup) {
        let backend = Arc::new(MemoryStore::new());
        let backup = Backup::new(backend.clone(), StorageConfig::new());
        (backend, backup)
    }

    #[test]
    fn test_export_empty() {
        let (_, backup) = backup();
        let document = backup.export().unwrap();
        assert_eq!(document.version, BACKUP_VERSION);
        assert_eq!(document.present().count(), 0);
    }

    #[test]
    fn test_export_import_roundtrip_is_byte_identical() {
        let (backend, backup) = backup();
        backend.set("trpg_settings", r#"{"image_mode": "gemini"}"#).unwrap();
        backend.set("trpg_scenarios", "[ ]").unwrap();
        backend.set("trpg_saved_games", "[]").unwrap();

        let exported = backup.export_json().unwrap();
        assert!(backup.import_json(&exported));

        assert_eq!(
            backend.get("trpg_settings").unwrap().as_deref(),
            Some(r#"{"image_mode": "gemini"}"#)
        );
        assert_eq!(backend.get("trpg_scenarios").unwrap().as_deref(), Some("[ ]"));
        assert_eq!(backend.get("trpg_characters").unwrap(), None);
    }

    #[test]
    fn test_import_leaves_absent_collections() {
        let (backend, backup) = backup();
        backend.set("trpg_characters", r#"[{"name":"Kept"}]"#).unwrap();

        assert!(backup.import_json(r#"{"scenarios": "[]", "characters": null}"#));
        assert_eq!(
            backend.get("trpg_characters").unwrap().as_deref(),
            Some(r#"[{"name":"Kept"}]"#)
        );
        assert_eq!(backend.get("trpg_scenarios").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_malformed_import_writes_nothing() {
        let (backend, backup) = backup();
        backend.set("trpg_scenarios", "[]").unwrap();

        assert!(!backup.import_json("not json at all"));
        assert!(!backup.import_json(r#"{"scenarios": "[{]", "settings": "{}"}"#));

        assert_eq!(backend.get("trpg_scenarios").unwrap().as_deref(), Some("[]"));
        assert_eq!(backend.get("trpg_settings").unwrap(), None);
    }

    /// Backend that refuses writes to one key.
    struct RefusingStore {
        inner: MemoryStore,
        refused: &'static str,
    }

    impl KeyValueStore for RefusingStore {
        fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
            if key == self.refused {
                return Err(PersistError::Backend(format!("{key} is read-only")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), PersistError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_failed_write_restores_earlier_collections() {
        let backend = Arc::new(RefusingStore {
            inner: MemoryStore::new(),
            refused: "trpg_current_game",
        });
        backend.inner.set("trpg_settings", r#"{"image_mode":"off"}"#).unwrap();
        let backup = Backup::new(backend.clone(), StorageConfig::new());

        let document = BackupDocument {
            settings: Some(r#"{"image_mode":"gemini"}"#.to_string()),
            scenarios: Some("[]".to_string()),
            current_game: Some("{}".to_string()),
            ..Default::default()
        };
        assert!(!backup.import(&document));

        assert_eq!(
            backend.get("trpg_settings").unwrap().as_deref(),
            Some(r#"{"image_mode":"off"}"#)
        );
        assert_eq!(backend.get("trpg_scenarios").unwrap(), None);
        assert_eq!(backend.get("trpg_current_game").unwrap(), None);
    }

    #[test]
    fn test_clear_all() {
        let (backend, backup) = backup();
        for collection in keys::ALL {
            backend.set(&format!("trpg_{collection}"), "{}").unwrap();
        }
        backend.set("unrelated", "1").unwrap();

        backup.clear_all().unwrap();
        assert_eq!(backend.len(), 1);
    }
}
