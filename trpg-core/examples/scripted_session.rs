//! Play a short scripted session against on-disk storage.
//!
//! Run with: `TRPG_DATA_DIR=/tmp/trpg cargo run -p trpg-core --example scripted_session`

use trpg_core::narrator::{ActionOutcome, Dialogue};
use trpg_core::world::{create_sample_scenario, create_sample_warrior, DangerLevel};
use trpg_core::{MockNarrator, StorageConfig, Tabletop};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Scripted Session ===\n");

    // 1. Open storage
    let config = StorageConfig::from_env();
    println!("1. Opening storage at {}", config.data_dir.display());
    let table = Tabletop::open(config);

    // 2. Library records
    println!("\n2. Storing scenario and character...");
    let scenario = table
        .scenarios()
        .upsert(create_sample_scenario("The Sunken Crypt"))?;
    let hero = table.characters().upsert(create_sample_warrior("Thorin"))?;
    println!("   Scenario: {} ({:?})", scenario.title, scenario.id);
    println!("   Character: {} ({:?})", hero.name, hero.id);

    // 3. Start the game
    let session = table.sessions().start_new_game(
        scenario.id.as_deref().unwrap_or_default(),
        hero.id.as_deref().unwrap_or_default(),
    )?;
    println!("\n3. Started session {} at {}", session.id, session.current_location);

    // 4. Play two turns
    let mut narrator = MockNarrator::new(vec![
        ActionOutcome {
            dialogues: vec![Dialogue {
                speaker: "Guide".to_string(),
                text: "Stay close to the wall.".to_string(),
            }],
            ..ActionOutcome::narration("Your torch throws long shadows down the stairs.")
        },
        ActionOutcome {
            damage_taken: 6,
            items_gained: vec!["Rusty Key".to_string()],
            danger_level: Some(DangerLevel::caution()),
            ..ActionOutcome::narration("A loose stone grazes your arm. Something glints below.")
        },
    ]);

    println!("\n4. Playing turns...");
    for action in ["I descend the stairs", "I search the rubble"] {
        if let Some(turn) = table.take_action(&mut narrator, action).await? {
            let (hp, max_hp) = turn.session.character.hp_status();
            println!("   > {action}");
            println!("   {} (HP {hp}/{max_hp})", turn.outcome.narration);
        }
    }

    // 5. Save and show the transcript
    if let Some(slot) = table.saves().save("Crypt stairs")? {
        println!("\n5. Saved as '{}'", slot.save_name);
    }
    if let Some(session) = table.sessions().current()? {
        println!("   ---");
        for event in &session.history {
            println!("   {}", event.transcript_line());
        }
        println!("   ---");
    }

    Ok(())
}
