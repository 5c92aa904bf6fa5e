//! Game data model: scenarios, characters, history events.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Open map of additional named fields carried verbatim.
pub type ExtraFields = Map<String, Value>;

/// Generate a fresh record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time, used for every timestamp in the crate.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

// ============================================================================
// Records
// ============================================================================

/// A record managed by an [`EntityStore`](crate::entity::EntityStore).
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Human-readable kind used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
}

/// A non-player character described by a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub personality: String,
}

impl Npc {
    /// Create an NPC.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        personality: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            personality: personality.into(),
        }
    }
}

/// A scenario template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub starting_scene: String,
    /// Ordered location names; the first one is where a session starts.
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub npcs: Vec<Npc>,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Scenario {
    /// Create a scenario with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the setting description.
    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    /// Set the player's goal.
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    /// Replace the location list. The first entry is the starting location.
    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Add an NPC.
    pub fn with_npc(mut self, npc: Npc) -> Self {
        self.npcs.push(npc);
        self
    }

    /// Replace the threat list.
    pub fn with_threats<I, S>(mut self, threats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.threats = threats.into_iter().map(Into::into).collect();
        self
    }

    /// The first listed location, if any.
    pub fn first_location(&self) -> Option<&str> {
        self.locations.first().map(String::as_str)
    }
}

impl Record for Scenario {
    const KIND: &'static str = "scenario";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
}

fn default_stat() -> i32 {
    10
}

fn default_hp() -> i32 {
    100
}

/// Character stat block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(rename = "maxHp", default = "default_hp")]
    pub max_hp: i32,
    #[serde(default = "default_stat")]
    pub strength: i32,
    #[serde(default = "default_stat")]
    pub agility: i32,
    #[serde(default = "default_stat")]
    pub intelligence: i32,
    #[serde(default = "default_stat")]
    pub luck: i32,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Default for CharacterStats {
    fn default() -> Self {
        Self {
            hp: default_hp(),
            max_hp: default_hp(),
            strength: default_stat(),
            agility: default_stat(),
            intelligence: default_stat(),
            luck: default_stat(),
            extra: ExtraFields::new(),
        }
    }
}

impl CharacterStats {
    /// Look up a stat by name. Unknown names fall through to integer extras.
    pub fn get(&self, name: &str) -> Option<i32> {
        match name.trim().to_lowercase().as_str() {
            "hp" => Some(self.hp),
            "maxhp" | "max_hp" => Some(self.max_hp),
            "strength" | "str" => Some(self.strength),
            "agility" | "agi" => Some(self.agility),
            "intelligence" | "int" => Some(self.intelligence),
            "luck" => Some(self.luck),
            _ => self
                .extra
                .get(name)
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok()),
        }
    }

    /// Clamp `hp` into `[0, max_hp]`.
    pub fn clamp_hp(&mut self) {
        self.hp = self.hp.clamp(0, self.max_hp.max(0));
    }

    /// Subtract `amount` from hp, never going below zero.
    pub fn take_damage(&mut self, amount: i32) {
        self.hp = self.hp.saturating_sub(amount);
        self.clamp_hp();
    }

    /// Add `amount` to hp, never going above `max_hp`.
    pub fn heal(&mut self, amount: i32) {
        self.hp = self.hp.saturating_add(amount);
        self.clamp_hp();
    }

    /// Whether hp has reached zero.
    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }
}

/// A player character sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub stats: CharacterStats,
    /// Ordered item names; duplicates are allowed.
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Character {
    /// Create a character with default stats and an empty inventory.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            ..Default::default()
        }
    }

    /// Replace the whole stat block.
    pub fn with_stats(mut self, stats: CharacterStats) -> Self {
        self.stats = stats;
        self
    }

    /// Set current and maximum hp. Not clamped here.
    pub fn with_hp(mut self, hp: i32, max_hp: i32) -> Self {
        self.stats.hp = hp;
        self.stats.max_hp = max_hp;
        self
    }

    /// Replace the inventory.
    pub fn with_inventory<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inventory = items.into_iter().map(Into::into).collect();
        self
    }

    /// Set the background text.
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    /// Append an item. Duplicates are kept.
    pub fn add_item(&mut self, item: impl Into<String>) {
        self.inventory.push(item.into());
    }

    /// Remove the first inventory entry equal to `item`.
    ///
    /// Returns `false` when no such entry exists.
    pub fn remove_item(&mut self, item: &str) -> bool {
        match self.inventory.iter().position(|i| i == item) {
            Some(pos) => {
                self.inventory.remove(pos);
                true
            }
            None => false,
        }
    }

    /// `(current, max)` hit points.
    pub fn hp_status(&self) -> (i32, i32) {
        (self.stats.hp, self.stats.max_hp)
    }
}

impl Record for Character {
    const KIND: &'static str = "character";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
}

// ============================================================================
// Session status
// ============================================================================

/// Danger status of the current scene.
///
/// Stored and overwritten as an opaque token; the well-known values are
/// provided as constants but any string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DangerLevel(String);

impl DangerLevel {
    pub const SAFE: &'static str = "safe";
    pub const CAUTION: &'static str = "caution";
    pub const DANGER: &'static str = "danger";

    /// Wrap any danger token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn safe() -> Self {
        Self::new(Self::SAFE)
    }

    pub fn caution() -> Self {
        Self::new(Self::CAUTION)
    }

    pub fn danger() -> Self {
        Self::new(Self::DANGER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DangerLevel {
    fn default() -> Self {
        Self::safe()
    }
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DangerLevel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DangerLevel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// History
// ============================================================================

/// Who produced a history event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Player,
    Gm,
    Npc,
    System,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Player => "player",
            Role::Gm => "gm",
            Role::Npc => "npc",
            Role::System => "system",
            Role::Other(s) => s,
        }
    }

    /// Transcript prefix, e.g. `[GM]`.
    pub fn label(&self) -> &str {
        match self {
            Role::Player => "[Player]",
            Role::Gm => "[GM]",
            Role::Npc => "[NPC]",
            Role::System | Role::Other(_) => "[System]",
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "player" => Role::Player,
            "gm" => Role::Gm,
            "npc" => Role::Npc,
            "system" => Role::System,
            _ => Role::Other(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Additional fields supplied by the caller, never overlapping the
    /// reserved `role` / `text` / `timestamp` keys.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl HistoryEvent {
    /// Field names that extra fields may not use.
    pub const RESERVED: [&'static str; 3] = ["role", "text", "timestamp"];

    /// Create an event stamped now. Extra keys named like a reserved field are dropped.
    pub fn new(role: Role, text: impl Into<String>, extra: ExtraFields) -> Self {
        let extra = extra
            .into_iter()
            .filter(|(k, _)| !Self::RESERVED.contains(&k.as_str()))
            .collect();

        Self {
            role,
            text: text.into(),
            timestamp: now(),
            extra,
        }
    }

    /// Render as a single transcript line.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.label(), self.text)
    }
}

// ============================================================================
// Samples
// ============================================================================

/// A small dungeon scenario used by tests and demos.
pub fn create_sample_scenario(title: &str) -> Scenario {
    Scenario::new(title)
        .with_setting("A damp dungeon beneath a ruined keep.")
        .with_goal("Recover the lost reliquary.")
        .with_locations(["Entrance", "Corridor", "Treasure Room"])
        .with_threats(["Traps", "Goblins"])
        .with_npc(Npc::new("Guide", "Ally", "Kind but nervous"))
}

/// A warrior with 80/100 hp, a sword and a torch.
pub fn create_sample_warrior(name: &str) -> Character {
    Character::new(name, "Warrior")
        .with_stats(CharacterStats {
            hp: 80,
            max_hp: 100,
            strength: 15,
            agility: 12,
            intelligence: 10,
            luck: 8,
            extra: ExtraFields::new(),
        })
        .with_inventory(["Sword", "Torch"])
        .with_background("A brave adventurer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_damage_and_heal_clamp() {
        let mut stats = CharacterStats {
            hp: 10,
            max_hp: 10,
            ..Default::default()
        };

        stats.take_damage(15);
        assert_eq!(stats.hp, 0);
        assert!(stats.is_down());

        stats.heal(3);
        assert_eq!(stats.hp, 3);

        stats.heal(100);
        assert_eq!(stats.hp, 10);
    }

    #[test]
    fn test_negative_amounts_stay_in_range() {
        let mut stats = CharacterStats {
            hp: 5,
            max_hp: 10,
            ..Default::default()
        };

        stats.take_damage(-50);
        assert_eq!(stats.hp, 10);

        stats.heal(-50);
        assert_eq!(stats.hp, 0);
    }

    #[test]
    fn test_remove_item_first_match_only() {
        let mut character = Character::new("Aria", "Ranger").with_inventory(["sword", "torch", "sword"]);

        assert!(character.remove_item("sword"));
        assert_eq!(character.inventory, vec!["torch", "sword"]);
        assert!(character.remove_item("sword"));
        assert!(!character.remove_item("sword"));
        assert_eq!(character.inventory, vec!["torch"]);
    }

    #[test]
    fn test_stat_lookup() {
        let character = create_sample_warrior("Thorin");
        assert_eq!(character.stats.get("strength"), Some(15));
        assert_eq!(character.stats.get("Agility"), Some(12));
        assert_eq!(character.stats.get("charisma"), None);
    }

    #[test]
    fn test_character_json_uses_max_hp_key() {
        let character = create_sample_warrior("Thorin");
        let value = serde_json::to_value(&character).unwrap();
        assert_eq!(value["stats"]["maxHp"], 100);
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let raw = json!({
            "id": "c1",
            "name": "Mira",
            "portrait": "mira.png",
            "stats": { "hp": 5, "maxHp": 9, "charisma": 14 }
        });

        let character: Character = serde_json::from_value(raw).unwrap();
        assert_eq!(character.extra["portrait"], "mira.png");
        assert_eq!(character.stats.get("charisma"), Some(14));
        assert_eq!(character.stats.luck, 10);

        let back = serde_json::to_value(&character).unwrap();
        assert_eq!(back["portrait"], "mira.png");
        assert_eq!(back["stats"]["charisma"], 14);
    }

    #[test]
    fn test_role_tokens() {
        assert_eq!(Role::from("gm"), Role::Gm);
        assert_eq!(Role::from("bard"), Role::Other("bard".to_string()));
        assert_eq!(String::from(Role::Npc), "npc");

        let value = serde_json::to_value(Role::Player).unwrap();
        assert_eq!(value, json!("player"));
    }

    #[test]
    fn test_history_event_drops_reserved_extras() {
        let mut extra = ExtraFields::new();
        extra.insert("role".to_string(), json!("gm"));
        extra.insert("text".to_string(), json!("overwritten"));
        extra.insert("mood".to_string(), json!("tense"));

        let event = HistoryEvent::new(Role::Player, "I open the door", extra);
        assert_eq!(event.role, Role::Player);
        assert_eq!(event.text, "I open the door");
        assert_eq!(event.extra.len(), 1);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["role"], "player");
        assert_eq!(value["text"], "I open the door");
        assert_eq!(value["mood"], "tense");
    }

    #[test]
    fn test_danger_level_is_opaque() {
        let level: DangerLevel = serde_json::from_value(json!("apocalyptic")).unwrap();
        assert_eq!(level.as_str(), "apocalyptic");
        assert_eq!(DangerLevel::default(), DangerLevel::safe());
    }
}
