//! Named save slots holding full copies of the current session.

use crate::persist::{read_json, write_json, KeyValueStore, PersistError};
use crate::session::{Session, SessionStore};
use crate::world::now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A stored snapshot of a session.
///
/// Serialized as the session's own fields plus `save_name` and `saved_at`,
/// so the slot's `id` is the id of the session it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSlot {
    #[serde(flatten)]
    pub session: Session,
    pub save_name: String,
    pub saved_at: DateTime<Utc>,
}

impl SaveSlot {
    /// Snapshot `session` under `save_name`, stamped now.
    pub fn new(session: Session, save_name: impl Into<String>) -> Self {
        Self {
            session,
            save_name: save_name.into(),
            saved_at: now(),
        }
    }

    /// Id used for load and delete: the embedded session id.
    pub fn id(&self) -> &str {
        &self.session.id
    }
}

/// Manager for the saved-games collection.
#[derive(Clone)]
pub struct SaveSlotManager {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    sessions: SessionStore,
}

impl SaveSlotManager {
    /// Create a manager for the slots under `key`, restoring through `sessions`.
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            sessions,
        }
    }

    /// Storage key of the saved-games collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All slots in insertion order.
    pub fn list(&self) -> Result<Vec<SaveSlot>, PersistError> {
        Ok(read_json(self.backend.as_ref(), &self.key)?.unwrap_or_default())
    }

    /// Snapshot the current session under `name`.
    ///
    /// A slot with the same name is replaced in place; otherwise the new slot
    /// is appended. Returns `None` when there is no current session.
    pub fn save(&self, name: &str) -> Result<Option<SaveSlot>, PersistError> {
        let Some(session) = self.sessions.current()? else {
            debug!(name, "save ignored: no active session");
            return Ok(None);
        };

        let slot = SaveSlot::new(session, name);
        let mut slots = self.list()?;

        match slots.iter().position(|s| s.save_name == name) {
            Some(pos) => slots[pos] = slot.clone(),
            None => slots.push(slot.clone()),
        }

        write_json(self.backend.as_ref(), &self.key, &slots)?;
        info!(name, session_id = %slot.session.id, slots = slots.len(), "saved game");
        Ok(Some(slot))
    }

    /// Find a slot by its session id.
    pub fn get(&self, save_id: &str) -> Result<Option<SaveSlot>, PersistError> {
        Ok(self.list()?.into_iter().find(|s| s.id() == save_id))
    }

    /// Install the slot with `save_id` as the current session.
    ///
    /// Returns the slot with its session as installed (so `updated_at` is
    /// refreshed), or `None` (leaving the current session alone) when no
    /// slot matches. The stored slot itself is not modified.
    pub fn load(&self, save_id: &str) -> Result<Option<SaveSlot>, PersistError> {
        let Some(mut slot) = self.get(save_id)? else {
            debug!(save_id, "load ignored: no such save");
            return Ok(None);
        };

        info!(save_id, name = %slot.save_name, "loading saved game");
        slot.session = self.sessions.replace(slot.session)?;
        Ok(Some(slot))
    }

    /// Remove the slot with `save_id`. Missing ids are ignored.
    pub fn delete(&self, save_id: &str) -> Result<(), PersistError> {
        let mut slots = self.list()?;
        let before = slots.len();
        slots.retain(|s| s.id() != save_id);

        if slots.len() != before {
            write_json(self.backend.as_ref(), &self.key, &slots)?;
            info!(save_id, "deleted saved game");
        }
        Ok(())
    }
}
