//! QA tests for narrator-driven turns.
//!
//! Uses `MockNarrator` so no remote service is needed.
//! Run with: `cargo test -p trpg-core --test qa_turns -- --nocapture`

use trpg_core::narrator::{ActionOutcome, Dialogue, HISTORY_WINDOW};
use trpg_core::testing::{assert_has_item, assert_hp, MockNarrator, OfflineNarrator, TestHarness};
use trpg_core::world::{create_sample_warrior, CharacterStats, DangerLevel, Role, Scenario};
use trpg_core::{Tabletop, TurnError};

// =============================================================================
// TEST 1: A short adventure
// =============================================================================

#[tokio::test]
async fn test_short_adventure() {
    println!("\n=== TEST: Short Adventure ===\n");
    let mut harness = TestHarness::new().expect("Failed to start game");

    harness
        .expect_narration("Cold air spills from the crypt entrance.")
        .expect_outcome(ActionOutcome {
            requires_roll: true,
            roll_type: Some("agility".to_string()),
            roll_difficulty: Some(14),
            danger_level: Some(DangerLevel::caution()),
            ..ActionOutcome::narration("The floor tilts beneath you!")
        })
        .expect_outcome(ActionOutcome {
            items_gained: vec!["Silver Key".to_string()],
            ..ActionOutcome::narration("You land lightly and spot a key.")
        });

    let turn = harness.act("I enter the crypt").await.unwrap().unwrap();
    println!("GM: {}", turn.outcome.narration);

    let turn = harness.act("I walk down the corridor").await.unwrap().unwrap();
    assert!(turn.outcome.requires_roll);
    let gm_event = turn.session.history.last().unwrap();
    assert_eq!(gm_event.extra["requires_roll"], true);
    assert_eq!(gm_event.extra["roll_type"], "agility");
    assert_eq!(gm_event.extra["roll_difficulty"], 14);

    // agility 12 gives +1, so a natural 13 meets DC 14
    let report = harness
        .roll("I jump aside", "agility", 14, 13)
        .await
        .unwrap()
        .unwrap();
    println!("Roll: {}", report.check);
    assert_eq!(report.check.total, 14);
    assert!(report.check.is_success);

    assert_has_item(&harness, "Silver Key");
    assert_hp(&harness, 80, 100);

    let session = harness.session().unwrap();
    let roles: Vec<Role> = session.history.iter().map(|e| e.role.clone()).collect();
    assert_eq!(
        roles,
        vec![
            Role::Player,
            Role::Gm,
            Role::Player,
            Role::Gm,
            Role::System,
            Role::Gm
        ]
    );
    assert_eq!(session.history[4].extra["stat"], "agility");
    assert_eq!(session.history[4].extra["is_success"], true);
    assert_eq!(session.danger_level, DangerLevel::caution());

    for event in &session.history {
        println!("{}", event.transcript_line());
    }
}

// =============================================================================
// TEST 2: What the narrator is sent
// =============================================================================

#[tokio::test]
async fn test_narrator_receives_recent_history() {
    let mut harness = TestHarness::new().unwrap();
    for i in 0..8 {
        harness.expect_narration(format!("Step {i}."));
    }

    for i in 0..8 {
        harness.act(&format!("I take step {i}")).await.unwrap();
    }

    let requests = &harness.narrator.action_requests;
    assert_eq!(requests.len(), 8);
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[1].history.len(), 2);

    let last = requests.last().unwrap();
    assert_eq!(last.history.len(), HISTORY_WINDOW);
    assert_eq!(last.action, "I take step 7");
    assert_eq!(last.history.last().unwrap().text, "Step 6.");
    assert_eq!(last.character.name, "Test Hero");
}

#[tokio::test]
async fn test_dialogue_and_damage() {
    let mut harness = TestHarness::new().unwrap();
    harness.expect_outcome(ActionOutcome {
        damage_taken: 200,
        dialogues: vec![
            Dialogue {
                speaker: "Goblin".to_string(),
                text: "Take that!".to_string(),
            },
            Dialogue {
                speaker: "Guide".to_string(),
                text: "Run!".to_string(),
            },
        ],
        danger_level: Some(DangerLevel::danger()),
        ..ActionOutcome::narration("An ambush!")
    });

    let turn = harness.act("I open the chest").await.unwrap().unwrap();

    assert_hp(&harness, 0, 100);
    assert!(turn.session.character.stats.is_down());
    assert_eq!(
        harness.history_texts(),
        vec!["I open the chest", "An ambush!", "Take that!", "Run!"]
    );
    assert_eq!(turn.session.history[1].extra["dialogues"][1]["speaker"], "Guide");
    assert_eq!(turn.session.history[3].extra["speaker"], "Guide");
}

// =============================================================================
// TEST 3: No session, failing narrator
// =============================================================================

#[tokio::test]
async fn test_turns_without_session() {
    let table = Tabletop::in_memory();
    let mut narrator = MockNarrator::new(vec![ActionOutcome::narration("unused")]);

    assert!(table
        .take_action(&mut narrator, "I look around")
        .await
        .unwrap()
        .is_none());
    assert!(table
        .resolve_roll(&mut narrator, "I climb", "strength", 12)
        .await
        .unwrap()
        .is_none());
    assert!(narrator.action_requests.is_empty());
    assert!(table.sessions().current().unwrap().is_none());
}

#[tokio::test]
async fn test_narrator_failure_keeps_player_action() {
    let harness = TestHarness::new().unwrap();
    let mut narrator = OfflineNarrator;

    let err = harness
        .table
        .take_action(&mut narrator, "I shout for help")
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Narrator(_)));

    assert_eq!(harness.history_texts(), vec!["I shout for help"]);
    assert_hp(&harness, 80, 100);
}

#[tokio::test]
async fn test_unknown_stat_rolls_with_default() {
    let mut harness = TestHarness::new().unwrap();
    harness.expect_narration("You try your best.");

    let report = harness
        .roll("I sing", "charisma", 12, 12)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.check.bonus, 0);
    assert_eq!(report.check.total, 12);
}

#[tokio::test]
async fn test_natural_one_that_meets_dc_reads_as_success() {
    let mut hero = create_sample_warrior("Brute");
    hero.stats.strength = 30;
    let mut harness = TestHarness::with_character(hero).unwrap();
    harness.expect_narration("You heave the gate open, barely.");

    // strength 30 gives +10, so a natural 1 still reaches DC 11
    let report = harness
        .roll("I lift the gate", "strength", 11, 1)
        .await
        .unwrap()
        .unwrap();
    assert!(report.check.is_fumble);
    assert!(report.check.is_success);

    let system = &report.session.history[0];
    assert_eq!(system.role, Role::System);
    assert!(system.text.ends_with("(Success!)"), "got {}", system.text);
}

#[tokio::test]
async fn test_extreme_stats_roll_without_panicking() {
    let hero = create_sample_warrior("Oddity").with_stats(CharacterStats {
        strength: i32::MIN,
        agility: i32::MAX,
        ..Default::default()
    });
    let mut harness = TestHarness::with_character(hero).unwrap();
    harness
        .expect_narration("You strain uselessly.")
        .expect_narration("You move like lightning.");

    let weak = harness
        .roll("I push the boulder", "strength", 12, 19)
        .await
        .unwrap()
        .unwrap();
    assert!(!weak.check.is_success);
    assert!(weak.check.total < 0);

    let quick = harness
        .roll("I dodge", "agility", 12, 2)
        .await
        .unwrap()
        .unwrap();
    assert!(quick.check.is_success);
    assert!(quick.check.bonus > 0);
}

// =============================================================================
// TEST 4: Generated scenarios
// =============================================================================

#[tokio::test]
async fn test_create_scenario_stores_it() {
    let table = Tabletop::in_memory();
    let mut narrator = MockNarrator::default();
    let mut generated = Scenario::new("Clockwork Tower").with_locations(["Gate", "Spire"]);
    generated.id = Some("narrator-chosen".to_string());
    narrator.set_scenario(generated);

    let stored = table
        .create_scenario(&mut narrator, "steampunk")
        .await
        .unwrap();

    assert_ne!(stored.id.as_deref(), Some("narrator-chosen"));
    assert!(stored.created_at.is_some());
    assert_eq!(stored.extra["theme"], "steampunk");
    assert_eq!(table.scenarios().list().unwrap(), vec![stored]);
}
