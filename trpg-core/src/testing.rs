//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockNarrator` for deterministic turns without a remote service
//! - `TestHarness` for a started game on in-memory storage
//! - Assertion helpers for verifying session state

use crate::dice::CheckOutcome;
use crate::narrator::{ActionOutcome, ActionRequest, Narrator, NarratorError, RollNarrationRequest};
use crate::session::Session;
use crate::table::{RollReport, Tabletop, TurnError, TurnReport};
use crate::world::{create_sample_scenario, create_sample_warrior, Character, Scenario};
use async_trait::async_trait;
use std::collections::VecDeque;

/// A narrator that returns scripted outcomes.
///
/// Use this for deterministic tests without network calls.
#[derive(Debug, Default)]
pub struct MockNarrator {
    /// Scripted outcomes to return in order.
    responses: Vec<ActionOutcome>,
    /// Index of next outcome to return.
    response_index: usize,
    /// Natural d20 results to use for rolls, consumed front first.
    rolls: VecDeque<u32>,
    /// Scenario returned by `generate_scenario`.
    scenario: Option<Scenario>,
    /// Every action request received.
    pub action_requests: Vec<ActionRequest>,
    /// Every roll narration request received.
    pub roll_requests: Vec<RollNarrationRequest>,
}

impl MockNarrator {
    /// Create a mock narrator with scripted outcomes.
    pub fn new(responses: Vec<ActionOutcome>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    /// Add an outcome to the queue.
    pub fn queue_response(&mut self, response: ActionOutcome) {
        self.responses.push(response);
    }

    /// Fix the next natural d20 result.
    pub fn queue_roll(&mut self, natural: u32) {
        self.rolls.push_back(natural);
    }

    /// Set the scenario returned for any theme.
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = Some(scenario);
    }

    /// Reset the response index to replay from the beginning.
    pub fn reset(&mut self) {
        self.response_index = 0;
    }

    fn next_response(&mut self) -> ActionOutcome {
        match self.responses.get(self.response_index) {
            Some(response) => {
                self.response_index += 1;
                response.clone()
            }
            None => ActionOutcome::narration("The narrator has no more scripted responses."),
        }
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn resolve_action(
        &mut self,
        request: ActionRequest,
    ) -> Result<ActionOutcome, NarratorError> {
        self.action_requests.push(request);
        Ok(self.next_response())
    }

    async fn narrate_roll(
        &mut self,
        request: RollNarrationRequest,
    ) -> Result<ActionOutcome, NarratorError> {
        self.roll_requests.push(request);
        Ok(self.next_response())
    }

    async fn generate_scenario(&mut self, theme: &str) -> Result<Scenario, NarratorError> {
        Ok(self
            .scenario
            .clone()
            .unwrap_or_else(|| create_sample_scenario(theme)))
    }

    async fn roll(
        &mut self,
        stat_value: i32,
        difficulty: i32,
    ) -> Result<CheckOutcome, NarratorError> {
        match self.rolls.pop_front() {
            Some(natural) => Ok(CheckOutcome::from_roll(natural, stat_value, difficulty)),
            None => Ok(crate::dice::roll_check(stat_value, difficulty)),
        }
    }
}

/// A narrator that always fails.
#[derive(Debug, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn resolve_action(&mut self, _: ActionRequest) -> Result<ActionOutcome, NarratorError> {
        Err(NarratorError::Unavailable)
    }

    async fn narrate_roll(
        &mut self,
        _: RollNarrationRequest,
    ) -> Result<ActionOutcome, NarratorError> {
        Err(NarratorError::Unavailable)
    }

    async fn generate_scenario(&mut self, _: &str) -> Result<Scenario, NarratorError> {
        Err(NarratorError::Unavailable)
    }
}

/// Test harness with a game already started on in-memory storage.
pub struct TestHarness {
    pub narrator: MockNarrator,
    pub table: Tabletop,
}

impl TestHarness {
    /// Start a game with the sample scenario and a sample warrior.
    pub fn new() -> Result<Self, TurnError> {
        Self::with_character(create_sample_warrior("Test Hero"))
    }

    /// Start a game with the sample scenario and a custom character.
    pub fn with_character(character: Character) -> Result<Self, TurnError> {
        let table = Tabletop::in_memory();
        let scenario = table.scenarios().upsert(create_sample_scenario("Test Dungeon"))?;
        let character = table.characters().upsert(character)?;
        table.sessions().start_new_game(
            scenario.id.as_deref().unwrap_or_default(),
            character.id.as_deref().unwrap_or_default(),
        )?;

        Ok(Self {
            narrator: MockNarrator::default(),
            table,
        })
    }

    /// Queue a plain narration outcome.
    pub fn expect_narration(&mut self, text: impl Into<String>) -> &mut Self {
        self.narrator.queue_response(ActionOutcome::narration(text));
        self
    }

    /// Queue a full outcome.
    pub fn expect_outcome(&mut self, outcome: ActionOutcome) -> &mut Self {
        self.narrator.queue_response(outcome);
        self
    }

    /// Play an action through the mock narrator.
    pub async fn act(&mut self, action: &str) -> Result<Option<TurnReport>, TurnError> {
        self.table.take_action(&mut self.narrator, action).await
    }

    /// Roll a check with a fixed natural result.
    pub async fn roll(
        &mut self,
        action: &str,
        stat: &str,
        difficulty: i32,
        natural: u32,
    ) -> Result<Option<RollReport>, TurnError> {
        self.narrator.queue_roll(natural);
        self.table
            .resolve_roll(&mut self.narrator, action, stat, difficulty)
            .await
    }

    /// The stored current session.
    pub fn session(&self) -> Option<Session> {
        self.table.sessions().current().ok().flatten()
    }

    /// Current hp as (current, max).
    pub fn player_hp(&self) -> Option<(i32, i32)> {
        self.session().map(|s| s.character.hp_status())
    }

    /// Texts of the recorded history, in order.
    pub fn history_texts(&self) -> Vec<String> {
        self.session()
            .map(|s| s.history.into_iter().map(|e| e.text).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert current hp is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    assert_eq!(
        harness.player_hp(),
        Some((current, max)),
        "Expected HP {current}/{max}"
    );
}

/// Assert the session character carries `item`.
#[track_caller]
pub fn assert_has_item(harness: &TestHarness, item: &str) {
    let inventory = harness
        .session()
        .map(|s| s.character.inventory)
        .unwrap_or_default();
    assert!(
        inventory.iter().any(|i| i == item),
        "Expected '{item}' in inventory {inventory:?}"
    );
}

/// Assert the session character does NOT carry `item`.
#[track_caller]
pub fn assert_no_item(harness: &TestHarness, item: &str) {
    let inventory = harness
        .session()
        .map(|s| s.character.inventory)
        .unwrap_or_default();
    assert!(
        !inventory.iter().any(|i| i == item),
        "Expected '{item}' to NOT be in inventory {inventory:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::Dialogue;
    use crate::world::{DangerLevel, Role};

    #[tokio::test]
    async fn test_mock_narrator_basic() {
        let mut harness = TestHarness::new().unwrap();
        harness.expect_narration("Water drips from the ceiling.");

        let turn = harness.act("I look around").await.unwrap().unwrap();

        assert_eq!(turn.outcome.narration, "Water drips from the ceiling.");
        assert_eq!(
            harness.history_texts(),
            vec!["I look around", "Water drips from the ceiling."]
        );
    }

    #[tokio::test]
    async fn test_outcome_updates_character() {
        let mut harness = TestHarness::new().unwrap();
        harness.expect_outcome(ActionOutcome {
            damage_taken: 15,
            items_gained: vec!["Key".to_string()],
            items_lost: vec!["Torch".to_string()],
            danger_level: Some(DangerLevel::danger()),
            ..ActionOutcome::narration("A dart flies from the wall!")
        });

        harness.act("I step forward").await.unwrap();

        assert_hp(&harness, 65, 100);
        assert_has_item(&harness, "Key");
        assert_no_item(&harness, "Torch");
        assert_eq!(
            harness.session().unwrap().danger_level,
            DangerLevel::danger()
        );
    }

    #[tokio::test]
    async fn test_dialogue_becomes_npc_events() {
        let mut harness = TestHarness::new().unwrap();
        harness.expect_outcome(ActionOutcome {
            dialogues: vec![Dialogue {
                speaker: "Guide".to_string(),
                text: "Mind the traps.".to_string(),
            }],
            npc_present: Some("Guide".to_string()),
            ..ActionOutcome::narration("The guide waves.")
        });

        harness.act("I greet the guide").await.unwrap();

        let history = harness.session().unwrap().history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::Gm);
        assert_eq!(history[1].extra["npc_present"], "Guide");
        assert_eq!(history[2].role, Role::Npc);
        assert_eq!(history[2].extra["speaker"], "Guide");
    }

    #[tokio::test]
    async fn test_scripted_roll() {
        let mut harness = TestHarness::new().unwrap();
        harness.expect_narration("You leap the gap.");

        let report = harness
            .roll("I jump the pit", "agility", 12, 11)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.check.roll, 11);
        assert_eq!(report.check.bonus, 1);
        assert!(report.check.is_success);
        assert_eq!(harness.narrator.roll_requests.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_responses() {
        let mut harness = TestHarness::new().unwrap();
        let turn = harness.act("I wait").await.unwrap().unwrap();
        assert!(turn.outcome.narration.contains("no more scripted"));

        harness.expect_narration("Again.");
        harness.narrator.reset();
        let turn = harness.act("I wait again").await.unwrap().unwrap();
        assert_eq!(turn.outcome.narration, "Again.");
    }
}
