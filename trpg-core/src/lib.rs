//! Session state and persistence for an AI-narrated tabletop RPG.
//!
//! This crate provides:
//! - Scenario and character libraries keyed by generated ids
//! - A single current game session with an append-only history
//! - Named save slots, flat settings and whole-store backup
//! - d20 ability checks and a port to the remote narrator
//!
//! Everything is stored as JSON text under a handful of keys in a
//! [`KeyValueStore`], either in memory or as files on disk.
//!
//! # Quick Start
//!
//! ```ignore
//! use trpg_core::{StorageConfig, Tabletop};
//! use trpg_core::world::{create_sample_scenario, create_sample_warrior};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = Tabletop::open(StorageConfig::from_env());
//!
//!     let scenario = table.scenarios().upsert(create_sample_scenario("The Crypt"))?;
//!     let hero = table.characters().upsert(create_sample_warrior("Thorin"))?;
//!     table.sessions().start_new_game(
//!         scenario.id.as_deref().unwrap_or_default(),
//!         hero.id.as_deref().unwrap_or_default(),
//!     )?;
//!
//!     let mut narrator = my_narrator();
//!     if let Some(turn) = table.take_action(&mut narrator, "I light a torch").await? {
//!         println!("{}", turn.outcome.narration);
//!     }
//!
//!     table.saves().save("Before the crypt")?;
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod config;
pub mod dice;
pub mod entity;
pub mod narrator;
pub mod persist;
pub mod saves;
pub mod session;
pub mod settings;
pub mod table;
pub mod testing;
pub mod world;

// Primary public API
pub use backup::{Backup, BackupDocument};
pub use config::StorageConfig;
pub use dice::CheckOutcome;
pub use entity::EntityStore;
pub use narrator::{ActionOutcome, Narrator, NarratorError};
pub use persist::{FileStore, KeyValueStore, MemoryStore, PersistError};
pub use saves::{SaveSlot, SaveSlotManager};
pub use session::{CharacterUpdate, Session, SessionStore};
pub use settings::{ImageMode, Settings, SettingsPatch, SettingsStore};
pub use table::{RollReport, Tabletop, TurnError, TurnReport};
pub use testing::{MockNarrator, TestHarness};
pub use world::{Character, CharacterStats, DangerLevel, HistoryEvent, Role, Scenario};
