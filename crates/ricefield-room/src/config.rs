//! Match configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RoomError;

// ---------------------------------------------------------------------------
// ChaffRule
// ---------------------------------------------------------------------------

/// How often a plain CHAFF cell (one without a powerup) can hurt a player.
///
/// Cells carrying a powerup are always one-shot per player, whatever this
/// says.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChaffRule {
    /// Every click on plain chaff costs a point.
    #[default]
    Repeatable,
    /// Plain chaff costs a point the first time each player clicks it,
    /// later clicks are ignored.
    OneShot,
}

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Longest match [`MatchConfig::validate`] accepts: one day.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Board layout, scoring and timing for every match the server starts.
///
/// `#[serde(default)]` lets a config file name only the fields it wants to
/// change; everything else falls back to [`MatchConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Number of cells on the board.
    pub total_cells: usize,

    /// How many of them are RICE (the rest are CHAFF).
    pub rice_cells: usize,

    /// Cells carrying a BUFF. Placed independently of grain.
    pub buff_cells: usize,

    /// Cells carrying a DEBUFF. Never on the same cell as a BUFF.
    pub debuff_cells: usize,

    /// Reaching this score wins immediately.
    pub target_score: u32,

    /// Match length in seconds. When it runs out the higher score wins.
    pub duration_secs: u64,

    /// Points a BUFF adds to its user.
    pub buff_bonus: u32,

    /// Points a DEBUFF removes from the opponent (floored at zero).
    pub debuff_penalty: u32,

    /// Plain-chaff click policy.
    pub chaff_rule: ChaffRule,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            total_cells: 100,
            rice_cells: 67,
            buff_cells: 5,
            debuff_cells: 3,
            target_score: 50,
            duration_secs: 100,
            buff_bonus: 3,
            debuff_penalty: 2,
            chaff_rule: ChaffRule::Repeatable,
        }
    }
}

impl MatchConfig {
    /// The match length as a `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Checks that a board can actually be generated from this config and
    /// that a match can end.
    ///
    /// # Errors
    /// [`RoomError::InvalidConfig`] naming the first broken rule.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.total_cells == 0 {
            return Err(RoomError::InvalidConfig(
                "total_cells must be at least 1".into(),
            ));
        }
        if self.rice_cells > self.total_cells {
            return Err(RoomError::InvalidConfig(format!(
                "rice_cells ({}) exceeds total_cells ({})",
                self.rice_cells, self.total_cells
            )));
        }
        match self.buff_cells.checked_add(self.debuff_cells) {
            Some(powerups) if powerups <= self.total_cells => {}
            _ => {
                return Err(RoomError::InvalidConfig(format!(
                    "buff_cells ({}) + debuff_cells ({}) exceeds total_cells ({})",
                    self.buff_cells, self.debuff_cells, self.total_cells
                )));
            }
        }
        if self.target_score == 0 {
            return Err(RoomError::InvalidConfig(
                "target_score must be at least 1".into(),
            ));
        }
        if self.duration_secs == 0 {
            return Err(RoomError::InvalidConfig(
                "duration_secs must be at least 1".into(),
            ));
        }
        if self.duration_secs > MAX_DURATION_SECS {
            return Err(RoomError::InvalidConfig(format!(
                "duration_secs ({}) exceeds {MAX_DURATION_SECS}",
                self.duration_secs
            )));
        }
        Ok(())
    }
}
