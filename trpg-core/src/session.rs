//! The current game session and the operations that mutate it.
//!
//! At most one [`Session`] exists at a time. It is created from a stored
//! scenario and character, grows an append-only history, and has its
//! embedded character copy updated through [`CharacterUpdate`]s. The stored
//! scenario and character records are never touched by play.

use crate::entity::EntityStore;
use crate::persist::{read_json, write_json, KeyValueStore, PersistError};
use crate::world::{
    new_id, now, Character, DangerLevel, ExtraFields, HistoryEvent, Role, Scenario,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Location used when a scenario lists none.
pub const FALLBACK_LOCATION: &str = "Starting Point";

/// An in-progress play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub scenario_id: String,
    pub character_id: String,

    /// Copy of the scenario as it was when the session started.
    pub scenario: Scenario,

    /// The session's own character copy; gameplay mutates only this one.
    pub character: Character,

    #[serde(default)]
    pub history: Vec<HistoryEvent>,

    pub current_location: String,

    #[serde(default)]
    pub danger_level: DangerLevel,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh session from a scenario and character.
    pub fn new(scenario: Scenario, mut character: Character) -> Self {
        let timestamp = now();
        let current_location = scenario
            .first_location()
            .unwrap_or(FALLBACK_LOCATION)
            .to_string();
        character.stats.clamp_hp();

        Self {
            id: new_id(),
            scenario_id: scenario.id.clone().unwrap_or_default(),
            character_id: character.id.clone().unwrap_or_default(),
            scenario,
            character,
            history: Vec::new(),
            current_location,
            danger_level: DangerLevel::default(),
            started_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// The last `count` history events, oldest first.
    pub fn recent_history(&self, count: usize) -> &[HistoryEvent] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    /// Apply an update to the embedded character and status fields.
    ///
    /// Order: damage, heal, added items, removed items, danger level,
    /// location. Always refreshes `updated_at`.
    pub fn apply(&mut self, update: &CharacterUpdate) {
        let stats = &mut self.character.stats;
        if let Some(damage) = update.damage {
            stats.take_damage(damage);
        }
        if let Some(heal) = update.heal {
            stats.heal(heal);
        }

        for item in &update.add_items {
            self.character.add_item(item.clone());
        }
        for item in &update.remove_items {
            // A name with no remaining match is skipped
            self.character.remove_item(item);
        }

        if let Some(level) = &update.danger_level {
            self.danger_level = level.clone();
        }
        if let Some(location) = &update.location {
            self.current_location = location.clone();
        }

        self.touch();
    }

    /// Append an event and refresh `updated_at`.
    pub fn push_event(&mut self, event: HistoryEvent) {
        self.history.push(event);
        self.touch();
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// A partial update to the session's character state.
///
/// Any subset of fields may be set; see [`Session::apply`] for ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heal: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danger_level: Option<DangerLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CharacterUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subtract `amount` from hp (floored at 0).
    pub fn with_damage(mut self, amount: i32) -> Self {
        self.damage = Some(amount);
        self
    }

    /// Add `amount` to hp (capped at max hp), after any damage.
    pub fn with_heal(mut self, amount: i32) -> Self {
        self.heal = Some(amount);
        self
    }

    /// Append an item to the inventory.
    pub fn with_added_item(mut self, item: impl Into<String>) -> Self {
        self.add_items.push(item.into());
        self
    }

    /// Remove the first inventory entry with this name.
    pub fn with_removed_item(mut self, item: impl Into<String>) -> Self {
        self.remove_items.push(item.into());
        self
    }

    /// Overwrite the session's danger level.
    pub fn with_danger_level(mut self, level: impl Into<DangerLevel>) -> Self {
        self.danger_level = Some(level.into());
        self
    }

    /// Move the session to `location`.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Owner of the single current-game record.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    scenarios: EntityStore<Scenario>,
    characters: EntityStore<Character>,
}

impl SessionStore {
    /// Create a store for the current game under `key`.
    ///
    /// `scenarios` and `characters` resolve the ids given to
    /// [`start_new_game`](Self::start_new_game).
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        scenarios: EntityStore<Scenario>,
        characters: EntityStore<Character>,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            scenarios,
            characters,
        }
    }

    /// Storage key of the current game.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Start a new game, replacing any existing session.
    ///
    /// Fails with [`PersistError::NotFound`] if either id is unknown; in that
    /// case nothing is written.
    pub fn start_new_game(
        &self,
        scenario_id: &str,
        character_id: &str,
    ) -> Result<Session, PersistError> {
        let scenario = self.scenarios.require(scenario_id)?;
        let character = self.characters.require(character_id)?;

        let session = Session::new(scenario, character);
        self.write(&session)?;

        info!(
            session_id = %session.id,
            scenario_id,
            character_id,
            location = %session.current_location,
            "started new game"
        );
        Ok(session)
    }

    /// The current session, if any.
    pub fn current(&self) -> Result<Option<Session>, PersistError> {
        read_json(self.backend.as_ref(), &self.key)
    }

    /// Append a history event.
    ///
    /// Returns `None` without writing anything when there is no session.
    pub fn add_to_history(
        &self,
        role: impl Into<Role>,
        text: impl Into<String>,
        extra: ExtraFields,
    ) -> Result<Option<Session>, PersistError> {
        let Some(mut session) = self.current()? else {
            debug!("add_to_history ignored: no active session");
            return Ok(None);
        };

        session.push_event(HistoryEvent::new(role.into(), text, extra));
        self.write(&session)?;
        Ok(Some(session))
    }

    /// Apply a [`CharacterUpdate`] to the current session.
    ///
    /// Returns `None` without writing anything when there is no session.
    pub fn update_character_state(
        &self,
        update: &CharacterUpdate,
    ) -> Result<Option<Session>, PersistError> {
        let Some(mut session) = self.current()? else {
            debug!("update_character_state ignored: no active session");
            return Ok(None);
        };

        session.apply(update);
        self.write(&session)?;

        debug!(
            hp = session.character.stats.hp,
            max_hp = session.character.stats.max_hp,
            items = session.character.inventory.len(),
            danger = %session.danger_level,
            "updated character state"
        );
        Ok(Some(session))
    }

    /// Install `session` as the current one, refreshing `updated_at`.
    pub fn replace(&self, mut session: Session) -> Result<Session, PersistError> {
        session.touch();
        self.write(&session)?;
        info!(session_id = %session.id, "replaced current session");
        Ok(session)
    }

    /// Remove the current session. Idempotent.
    pub fn clear(&self) -> Result<(), PersistError> {
        self.backend.remove(&self.key)?;
        info!("cleared current session");
        Ok(())
    }

    fn write(&self, session: &Session) -> Result<(), PersistError> {
        write_json(self.backend.as_ref(), &self.key, session)
    }
}
