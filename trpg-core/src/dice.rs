//! d20 ability checks.
//!
//! A check rolls one d20 and adds a bonus derived from the stat:
//! `floor((stat - 10) / 2)`. A natural 20 always succeeds.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stat value used when the caller has none.
pub const DEFAULT_STAT: i32 = 10;

/// Difficulty used when the caller has none.
pub const DEFAULT_DIFFICULTY: i32 = 12;

/// Result of one ability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// The natural d20 result.
    pub roll: u32,
    pub bonus: i32,
    pub total: i32,
    pub difficulty: i32,
    pub is_success: bool,
    pub is_critical: bool,
    pub is_fumble: bool,
}

impl CheckOutcome {
    /// Build the outcome for a given natural roll.
    pub fn from_roll(roll: u32, stat_value: i32, difficulty: i32) -> Self {
        let bonus = stat_bonus(stat_value);
        let total = roll as i32 + bonus;
        let is_critical = roll == 20;

        Self {
            roll,
            bonus,
            total,
            difficulty,
            is_success: total >= difficulty || is_critical,
            is_critical,
            is_fumble: roll == 1,
        }
    }

    /// Short verdict for transcripts.
    pub fn label(&self) -> &'static str {
        if self.is_critical {
            "Critical!"
        } else if self.is_success {
            "Success!"
        } else if self.is_fumble {
            "Fumble..."
        } else {
            "Failure..."
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.bonus < 0 { '-' } else { '+' };
        write!(
            f,
            "[{}] {} {} = {} vs DC {} ({})",
            self.roll,
            sign,
            self.bonus.abs(),
            self.total,
            self.difficulty,
            self.label()
        )
    }
}

/// Bonus granted by a stat value.
///
/// Extreme stat values saturate instead of overflowing.
pub fn stat_bonus(stat_value: i32) -> i32 {
    stat_value.saturating_sub(10).div_euclid(2)
}

/// Roll a check with the thread RNG.
pub fn roll_check(stat_value: i32, difficulty: i32) -> CheckOutcome {
    roll_check_with_rng(stat_value, difficulty, &mut rand::thread_rng())
}

/// Roll a check with a specific RNG (useful for testing).
pub fn roll_check_with_rng<R: Rng>(stat_value: i32, difficulty: i32, rng: &mut R) -> CheckOutcome {
    let roll = rng.gen_range(1..=20u32);
    CheckOutcome::from_roll(roll, stat_value, difficulty)
}
