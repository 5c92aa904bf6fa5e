//! Port to the remote narrative service.
//!
//! The service turns player actions into narration and state changes,
//! narrates dice checks and writes new scenarios. This crate only defines
//! the request/response shapes; the transport lives elsewhere.

use crate::dice::{self, CheckOutcome};
use crate::session::CharacterUpdate;
use crate::world::{Character, DangerLevel, HistoryEvent, Scenario};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// How many history events are sent along with an action.
pub const HISTORY_WINDOW: usize = 10;

/// Errors from the narrative service.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Narrator unavailable")]
    Unavailable,

    #[error("Narrator request failed: {0}")]
    Request(String),

    #[error("Invalid narrator response: {0}")]
    InvalidResponse(String),
}

/// A player action to resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub scenario: Scenario,
    pub character: Character,
    pub history: Vec<HistoryEvent>,
    pub action: String,
}

/// A finished check to narrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollNarrationRequest {
    pub scenario: Scenario,
    pub character: Character,
    pub action: String,
    pub roll: CheckOutcome,
}

/// A line spoken by an NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialogue {
    pub speaker: String,
    pub text: String,
}

/// The narrator's answer to an action or a check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub dialogues: Vec<Dialogue>,
    #[serde(default)]
    pub requires_roll: bool,
    /// Stat to check, e.g. `strength`.
    #[serde(default)]
    pub roll_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i32")]
    pub roll_difficulty: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub damage_taken: i32,
    #[serde(default)]
    pub items_gained: Vec<String>,
    #[serde(default)]
    pub items_lost: Vec<String>,
    #[serde(default)]
    pub npc_present: Option<String>,
    #[serde(default)]
    pub danger_level: Option<DangerLevel>,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

impl ActionOutcome {
    /// Outcome with only narration text and no state changes.
    pub fn narration(text: impl Into<String>) -> Self {
        Self {
            narration: text.into(),
            ..Default::default()
        }
    }

    /// Neutral outcome used when the service itself failed.
    pub fn fallback() -> Self {
        Self {
            narration: "Something went wrong; the world holds its breath.".to_string(),
            danger_level: Some(DangerLevel::safe()),
            ..Default::default()
        }
    }

    /// State changes this outcome asks for.
    pub fn to_update(&self) -> CharacterUpdate {
        CharacterUpdate {
            damage: (self.damage_taken != 0).then_some(self.damage_taken),
            heal: None,
            add_items: self.items_gained.clone(),
            remove_items: self.items_lost.clone(),
            danger_level: self.danger_level.clone(),
            location: None,
        }
    }
}

/// The remote narrative service.
#[async_trait]
pub trait Narrator: Send {
    /// Resolve a player action against the current session state.
    async fn resolve_action(
        &mut self,
        request: ActionRequest,
    ) -> Result<ActionOutcome, NarratorError>;

    /// Narrate the consequences of a finished check.
    async fn narrate_roll(
        &mut self,
        request: RollNarrationRequest,
    ) -> Result<ActionOutcome, NarratorError>;

    /// Write a new scenario for `theme`.
    async fn generate_scenario(&mut self, theme: &str) -> Result<Scenario, NarratorError>;

    /// Roll a check. Defaults to a local d20 roll.
    async fn roll(
        &mut self,
        stat_value: i32,
        difficulty: i32,
    ) -> Result<CheckOutcome, NarratorError> {
        Ok(dice::roll_check(stat_value, difficulty))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn to_i32(&self) -> Option<i32> {
        match self {
            NumberOrText::Number(n) => i32::try_from(*n).ok(),
            NumberOrText::Float(f) => Some(f.round() as i32),
            NumberOrText::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Accept `5`, `5.0` or `"5"`; anything unparseable becomes 0.
fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.to_i32()).unwrap_or(0))
}

fn lenient_opt_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.to_i32()))
}
