//! The tabletop: every store wired to one backend, plus the turn flow.
//!
//! # Example
//!
//! ```ignore
//! use trpg_core::{StorageConfig, Tabletop};
//!
//! let table = Tabletop::open(StorageConfig::from_env());
//! let scenario = table.scenarios().upsert(my_scenario)?;
//! let hero = table.characters().upsert(my_character)?;
//! table.sessions().start_new_game(
//!     scenario.id.as_deref().unwrap_or_default(),
//!     hero.id.as_deref().unwrap_or_default(),
//! )?;
//!
//! if let Some(turn) = table.take_action(&mut narrator, "I open the door").await? {
//!     println!("{}", turn.outcome.narration);
//! }
//! ```

use crate::backup::Backup;
use crate::config::StorageConfig;
use crate::dice::{CheckOutcome, DEFAULT_STAT};
use crate::entity::EntityStore;
use crate::narrator::{
    ActionOutcome, ActionRequest, Narrator, NarratorError, RollNarrationRequest, HISTORY_WINDOW,
};
use crate::persist::{keys, FileStore, KeyValueStore, MemoryStore, PersistError};
use crate::saves::SaveSlotManager;
use crate::session::{Session, SessionStore};
use crate::settings::SettingsStore;
use crate::world::{Character, ExtraFields, Role, Scenario};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from a game turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Narrator error: {0}")]
    Narrator(#[from] NarratorError),
}

/// Result of [`Tabletop::take_action`].
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub outcome: ActionOutcome,
    /// The session after every update of the turn was applied.
    pub session: Session,
}

/// Result of [`Tabletop::resolve_roll`].
#[derive(Debug, Clone)]
pub struct RollReport {
    pub check: CheckOutcome,
    pub outcome: ActionOutcome,
    pub session: Session,
}

/// All stores sharing one persistence backend.
#[derive(Clone)]
pub struct Tabletop {
    config: StorageConfig,
    backend: Arc<dyn KeyValueStore>,
    scenarios: EntityStore<Scenario>,
    characters: EntityStore<Character>,
    sessions: SessionStore,
    saves: SaveSlotManager,
    settings: SettingsStore,
    backup: Backup,
}

impl Tabletop {
    /// Wire every store to `backend` using the keys from `config`.
    pub fn new(backend: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self {
        let scenarios = EntityStore::new(backend.clone(), config.key(keys::SCENARIOS));
        let characters = EntityStore::new(backend.clone(), config.key(keys::CHARACTERS));
        let sessions = SessionStore::new(
            backend.clone(),
            config.key(keys::CURRENT_GAME),
            scenarios.clone(),
            characters.clone(),
        );
        let saves = SaveSlotManager::new(
            backend.clone(),
            config.key(keys::SAVED_GAMES),
            sessions.clone(),
        );
        let settings = SettingsStore::new(backend.clone(), config.key(keys::SETTINGS));
        let backup = Backup::new(backend.clone(), config.clone());

        Self {
            config,
            backend,
            scenarios,
            characters,
            sessions,
            saves,
            settings,
            backup,
        }
    }

    /// File-backed tabletop rooted at `config.data_dir`.
    pub fn open(config: StorageConfig) -> Self {
        info!(dir = %config.data_dir.display(), "opening file storage");
        let backend = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::new(backend, config)
    }

    /// Tabletop backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), StorageConfig::new())
    }

    /// Storage configuration in use.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The shared persistence backend.
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Scenario library.
    pub fn scenarios(&self) -> &EntityStore<Scenario> {
        &self.scenarios
    }

    /// Character library.
    pub fn characters(&self) -> &EntityStore<Character> {
        &self.characters
    }

    /// Current game session.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Named save slots.
    pub fn saves(&self) -> &SaveSlotManager {
        &self.saves
    }

    /// User settings.
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Bulk export, import and wipe.
    pub fn backup(&self) -> &Backup {
        &self.backup
    }

    /// Play one action through the narrator.
    ///
    /// Records the player's action, asks the narrator for the outcome,
    /// applies the requested state changes and records the narration and
    /// any NPC lines. Returns `None` if there is no current session.
    pub async fn take_action<N>(
        &self,
        narrator: &mut N,
        action: &str,
    ) -> Result<Option<TurnReport>, TurnError>
    where
        N: Narrator + ?Sized,
    {
        let Some(session) = self.sessions.current()? else {
            debug!("take_action ignored: no active session");
            return Ok(None);
        };

        let request = ActionRequest {
            scenario: session.scenario.clone(),
            character: session.character.clone(),
            history: session.recent_history(HISTORY_WINDOW).to_vec(),
            action: action.to_string(),
        };

        if self
            .sessions
            .add_to_history(Role::Player, action, ExtraFields::new())?
            .is_none()
        {
            return Ok(None);
        }

        let outcome = narrator.resolve_action(request).await?;
        debug!(
            damage = outcome.damage_taken,
            requires_roll = outcome.requires_roll,
            "narrator resolved action"
        );

        Ok(self
            .record_outcome(&outcome)?
            .map(|session| TurnReport { outcome, session }))
    }

    /// Roll a check on `stat` and have the narrator describe the result.
    ///
    /// Unknown stats roll with the default value. Returns `None` if there
    /// is no current session.
    pub async fn resolve_roll<N>(
        &self,
        narrator: &mut N,
        action: &str,
        stat: &str,
        difficulty: i32,
    ) -> Result<Option<RollReport>, TurnError>
    where
        N: Narrator + ?Sized,
    {
        let Some(session) = self.sessions.current()? else {
            debug!("resolve_roll ignored: no active session");
            return Ok(None);
        };

        let stat_value = session.character.stats.get(stat).unwrap_or(DEFAULT_STAT);
        let check = narrator.roll(stat_value, difficulty).await?;

        let mut extra = match serde_json::to_value(check) {
            Ok(Value::Object(map)) => map,
            _ => ExtraFields::new(),
        };
        extra.insert("stat".to_string(), json!(stat));
        let text = format!("{stat} check: {check}");
        if self.sessions.add_to_history(Role::System, text, extra)?.is_none() {
            return Ok(None);
        }

        let request = RollNarrationRequest {
            scenario: session.scenario,
            character: session.character,
            action: action.to_string(),
            roll: check,
        };
        let outcome = narrator.narrate_roll(request).await?;

        Ok(self
            .record_outcome(&outcome)?
            .map(|session| RollReport {
                check,
                outcome,
                session,
            }))
    }

    /// Ask the narrator for a scenario on `theme` and store it.
    pub async fn create_scenario<N>(
        &self,
        narrator: &mut N,
        theme: &str,
    ) -> Result<Scenario, TurnError>
    where
        N: Narrator + ?Sized,
    {
        let mut scenario = narrator.generate_scenario(theme).await?;
        scenario.id = None;
        scenario
            .extra
            .entry("theme")
            .or_insert_with(|| json!(theme));

        let stored = self.scenarios.upsert(scenario)?;
        info!(id = ?stored.id, title = %stored.title, "stored generated scenario");
        Ok(stored)
    }

    /// Apply an outcome's state changes and record its narration.
    fn record_outcome(&self, outcome: &ActionOutcome) -> Result<Option<Session>, PersistError> {
        if self
            .sessions
            .update_character_state(&outcome.to_update())?
            .is_none()
        {
            return Ok(None);
        }

        let mut extra = ExtraFields::new();
        if !outcome.dialogues.is_empty() {
            extra.insert("dialogues".to_string(), json!(outcome.dialogues));
        }
        if outcome.requires_roll {
            extra.insert("requires_roll".to_string(), json!(true));
            extra.insert("roll_type".to_string(), json!(outcome.roll_type));
            extra.insert("roll_difficulty".to_string(), json!(outcome.roll_difficulty));
        }
        if let Some(npc) = &outcome.npc_present {
            extra.insert("npc_present".to_string(), json!(npc));
        }
        if let Some(prompt) = &outcome.image_prompt {
            extra.insert("image_prompt".to_string(), json!(prompt));
        }

        let mut session = self
            .sessions
            .add_to_history(Role::Gm, outcome.narration.clone(), extra)?;

        for line in &outcome.dialogues {
            let mut extra = ExtraFields::new();
            extra.insert("speaker".to_string(), json!(line.speaker));
            session = self
                .sessions
                .add_to_history(Role::Npc, line.text.clone(), extra)?;
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{create_sample_scenario, create_sample_warrior};

    #[test]
    fn test_stores_share_backend() {
        let table = Tabletop::in_memory();
        let scenario = table.scenarios().upsert(create_sample_scenario("Crypt")).unwrap();
        let hero = table.characters().upsert(create_sample_warrior("Thorin")).unwrap();

        table
            .sessions()
            .start_new_game(scenario.id.as_deref().unwrap(), hero.id.as_deref().unwrap())
            .unwrap();
        table.saves().save("first").unwrap();

        let document = table.backup().export().unwrap();
        assert!(document.scenarios.is_some());
        assert!(document.characters.is_some());
        assert!(document.current_game.is_some());
        assert!(document.saved_games.is_some());
        assert!(document.settings.is_none());
    }

    #[test]
    fn test_custom_prefix() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let table = Tabletop::new(
            backend.clone(),
            StorageConfig::new().with_key_prefix("alt_"),
        );
        table.scenarios().upsert(Scenario::new("Keyed")).unwrap();

        assert!(backend.get("alt_scenarios").unwrap().is_some());
        assert!(backend.get("trpg_scenarios").unwrap().is_none());
    }
}
