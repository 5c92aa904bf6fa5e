//! Generic upsert/lookup/delete over a persisted record collection.

use crate::persist::{read_json, write_json, KeyValueStore, PersistError};
use crate::world::{new_id, now, Record};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A named, ordered collection of [`Record`]s stored as one JSON array.
pub struct EntityStore<T> {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            key: self.key.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> EntityStore<T> {
    /// Create a store for the collection under `key`.
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            _record: PhantomData,
        }
    }

    /// Storage key of this collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All records in persisted order. Empty if nothing has been saved.
    pub fn list(&self) -> Result<Vec<T>, PersistError> {
        Ok(read_json(self.backend.as_ref(), &self.key)?.unwrap_or_default())
    }

    /// The record with `id`, or `None`.
    pub fn get(&self, id: &str) -> Result<Option<T>, PersistError> {
        Ok(self.list()?.into_iter().find(|r| r.id() == Some(id)))
    }

    /// Like [`get`](Self::get) but a missing record is an error.
    pub fn require(&self, id: &str) -> Result<T, PersistError> {
        self.get(id)?
            .ok_or_else(|| PersistError::not_found(T::KIND, id))
    }

    /// Insert or fully replace a record.
    ///
    /// A record without an id gets a fresh one. A record without a creation
    /// timestamp keeps the one already stored under its id, or gets the
    /// current time if it is new. Replaced records keep their position.
    pub fn upsert(&self, mut record: T) -> Result<T, PersistError> {
        let mut records = self.list()?;

        let id = match record.id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = new_id();
                record.set_id(id.clone());
                id
            }
        };

        let existing = records.iter().position(|r| r.id() == Some(id.as_str()));

        if record.created_at().is_none() {
            let created_at = existing
                .and_then(|pos| records[pos].created_at())
                .unwrap_or_else(now);
            record.set_created_at(created_at);
        }

        match existing {
            Some(pos) => {
                debug!(kind = T::KIND, id = %id, "replacing record");
                records[pos] = record.clone();
            }
            None => {
                debug!(kind = T::KIND, id = %id, "inserting record");
                records.push(record.clone());
            }
        }

        write_json(self.backend.as_ref(), &self.key, &records)?;
        Ok(record)
    }

    /// Remove the record with `id`. Missing ids are ignored.
    pub fn delete(&self, id: &str) -> Result<(), PersistError> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|r| r.id() != Some(id));

        if records.len() != before {
            debug!(kind = T::KIND, id, "deleted record");
            write_json(self.backend.as_ref(), &self.key, &records)?;
        }
        Ok(())
    }
}
