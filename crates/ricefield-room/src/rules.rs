//! Match rules as a pure state machine.
//!
//! [`MatchState`] knows nothing about tasks, channels or timers. Every
//! operation mutates the state and returns the messages it produced as
//! `(Recipient, ServerMessage)` pairs; the actor in [`crate::engine`]
//! decides how to deliver them. That split keeps the scoring rules testable
//! with plain `#[test]` functions.
//!
//! # Scoring summary
//!
//! | Click on              | Effect for the clicker                      |
//! |-----------------------|---------------------------------------------|
//! | unclaimed RICE        | +1, the cell is claimed for the whole match |
//! | RICE claimed by anyone| nothing                                     |
//! | CHAFF                 | -1, floored at 0                            |
//! | any powerup cell      | +1 item of that kind, once per player       |
//!
//! A cell carrying a powerup resolves once per player in full, grain
//! effect included. Plain chaff repeats unless the config says
//! [`ChaffRule::OneShot`].

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ricefield_protocol::{
    EndOutcome, GrainKind, MatchId, PowerupKind, Recipient, ServerMessage,
    Username,
};
use ricefield_session::MatchRecord;
use tokio::time::Instant;

use crate::{Board, ChaffRule, MatchConfig};

/// The message a debuff user sees.
pub const DEBUFF_SUCCESS_TEXT: &str = "Opponent score reduced";

/// Outbound messages with their recipients.
pub type Outbox = Vec<(Recipient, ServerMessage)>;

/// A consumable item held in a player's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Buff,
    Debuff,
}

/// Items a player has picked up and not used yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inventory {
    pub buffs: u32,
    pub debuffs: u32,
}

impl Inventory {
    fn slot(&mut self, item: Item) -> &mut u32 {
        match item {
            Item::Buff => &mut self.buffs,
            Item::Debuff => &mut self.debuffs,
        }
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    TargetReached,
    AllRiceClaimed,
    Timeout,
    Forfeit,
}

/// Lifecycle of a match. `Ended` is terminal and entered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPhase {
    Active,
    Ended {
        reason: EndReason,
        winner: Option<Username>,
        duration: Duration,
    },
}

/// The final result of a match, handed to whoever awaits the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: MatchId,
    /// Host first.
    pub players: [Username; 2],
    pub scores: [u32; 2],
    /// `None` for a draw.
    pub winner: Option<Username>,
    pub reason: EndReason,
    pub duration: Duration,
}

impl MatchSummary {
    /// The persistence form of this summary.
    pub fn to_record(&self, played_at: DateTime<Utc>) -> MatchRecord {
        MatchRecord {
            match_id: self.match_id,
            players: self.players.clone(),
            scores: self.scores,
            winner: self.winner.clone(),
            duration_secs: self.duration.as_secs(),
            played_at,
        }
    }
}

/// A point-in-time view of a running match, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub players: [Username; 2],
    pub scores: [u32; 2],
    pub inventories: [Inventory; 2],
    pub rice_claimed: usize,
    pub phase: MatchPhase,
}

/// All mutable state of one match.
#[derive(Debug)]
pub struct MatchState {
    id: MatchId,
    players: [Username; 2],
    board: Board,
    config: MatchConfig,
    scores: [u32; 2],
    inventories: [Inventory; 2],
    /// Cells each player has already resolved and may not resolve again.
    resolved: [HashSet<usize>; 2],
    /// RICE cells claimed by either player.
    claimed_rice: HashSet<usize>,
    rice_total: usize,
    phase: MatchPhase,
    started_at: Instant,
}

impl MatchState {
    /// Creates an active match. `players[0]` is the host.
    pub fn new(
        id: MatchId,
        players: [Username; 2],
        board: Board,
        config: MatchConfig,
    ) -> Self {
        let rice_total = board.rice_count();
        Self {
            id,
            players,
            board,
            config,
            scores: [0; 2],
            inventories: [Inventory::default(); 2],
            resolved: [HashSet::new(), HashSet::new()],
            claimed_rice: HashSet::new(),
            rice_total,
            phase: MatchPhase::Active,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn players(&self) -> &[Username; 2] {
        &self.players
    }

    pub fn phase(&self) -> &MatchPhase {
        &self.phase
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended { .. })
    }

    pub fn scores(&self) -> [u32; 2] {
        self.scores
    }

    /// The score of `player`, or `None` if they aren't in this match.
    pub fn score_of(&self, player: &str) -> Option<u32> {
        self.seat_of(player).map(|seat| self.scores[seat])
    }

    pub fn inventory_of(&self, player: &str) -> Option<Inventory> {
        self.seat_of(player).map(|seat| self.inventories[seat])
    }

    /// Number of distinct RICE cells claimed so far.
    pub fn rice_claimed(&self) -> usize {
        self.claimed_rice.len()
    }

    fn seat_of(&self, player: &str) -> Option<usize> {
        self.players.iter().position(|p| p.as_str() == player)
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id,
            players: self.players.clone(),
            scores: self.scores,
            inventories: self.inventories,
            rice_claimed: self.claimed_rice.len(),
            phase: self.phase.clone(),
        }
    }

    /// The final summary, once the match has ended.
    pub fn summary(&self) -> Option<MatchSummary> {
        match &self.phase {
            MatchPhase::Active => None,
            MatchPhase::Ended {
                reason,
                winner,
                duration,
            } => Some(MatchSummary {
                match_id: self.id,
                players: self.players.clone(),
                scores: self.scores,
                winner: winner.clone(),
                reason: *reason,
                duration: *duration,
            }),
        }
    }

    /// One `GAME_STARTED` per player, each naming the other as opponent.
    pub fn start_messages(&self) -> Outbox {
        let rice_cells = self.board.rice_indices();
        (0..2)
            .map(|seat| {
                (
                    Recipient::Player(self.players[seat].clone()),
                    ServerMessage::GameStarted {
                        match_id: self.id,
                        opponent: self.players[1 - seat].clone(),
                        duration_secs: self.config.duration_secs,
                        rice_cells: rice_cells.clone(),
                    },
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Resolves a click by `player` on cell `index`.
    ///
    /// Clicks after the end, from strangers, out of range, or on a cell the
    /// player already resolved produce nothing.
    pub fn resolve_cell(&mut self, player: &str, index: usize) -> Outbox {
        if self.is_ended() {
            return Vec::new();
        }
        let Some(seat) = self.seat_of(player) else {
            return Vec::new();
        };
        let Some(cell) = self.board.get(index) else {
            tracing::debug!(match_id = %self.id, %player, index, "click out of range");
            return Vec::new();
        };

        let one_shot = cell.powerup.is_some()
            || cell.grain == GrainKind::Rice
            || self.config.chaff_rule == ChaffRule::OneShot;
        if one_shot && !self.resolved[seat].insert(index) {
            return Vec::new();
        }

        let mut changed = false;
        match cell.grain {
            GrainKind::Rice => {
                if self.claimed_rice.insert(index) {
                    self.scores[seat] += 1;
                    changed = true;
                }
            }
            GrainKind::Chaff => {
                self.scores[seat] = self.scores[seat].saturating_sub(1);
                changed = true;
            }
        }
        match cell.powerup {
            PowerupKind::Buff => {
                self.inventories[seat].buffs += 1;
                changed = true;
            }
            PowerupKind::Debuff => {
                self.inventories[seat].debuffs += 1;
                changed = true;
            }
            PowerupKind::None => {}
        }
        if !changed {
            // Rice the opponent already took.
            return Vec::new();
        }

        let name = self.players[seat].clone();
        let score = self.scores[seat];
        let kind = cell.kind();
        let mut out = vec![
            (
                Recipient::Player(name.clone()),
                ServerMessage::GrainResult { cell: index, kind, score },
            ),
            (
                Recipient::AllExcept(name.clone()),
                ServerMessage::OpponentGrainClick { cell: index, kind },
            ),
            (
                Recipient::AllExcept(name.clone()),
                ServerMessage::OpponentScore { player: name, score },
            ),
        ];

        if score >= self.config.target_score {
            out.extend(self.finish(EndReason::TargetReached, Some(seat)));
        } else if self.rice_total > 0 && self.claimed_rice.len() >= self.rice_total {
            let winner = self.leader();
            out.extend(self.finish(EndReason::AllRiceClaimed, winner));
        }
        out
    }

    /// Consumes one `item` from `player`'s inventory. Nothing happens when
    /// they hold none.
    pub fn use_item(&mut self, player: &str, item: Item) -> Outbox {
        if self.is_ended() {
            return Vec::new();
        }
        let Some(seat) = self.seat_of(player) else {
            return Vec::new();
        };
        let slot = self.inventories[seat].slot(item);
        if *slot == 0 {
            tracing::debug!(match_id = %self.id, %player, ?item, "no item to use");
            return Vec::new();
        }
        *slot -= 1;

        let me = self.players[seat].clone();
        match item {
            Item::Buff => {
                self.scores[seat] += self.config.buff_bonus;
                let score = self.scores[seat];
                let mut out = vec![
                    (
                        Recipient::Player(me.clone()),
                        ServerMessage::BuffActivated { score },
                    ),
                    (
                        Recipient::AllExcept(me.clone()),
                        ServerMessage::OpponentScore { player: me, score },
                    ),
                ];
                if score >= self.config.target_score {
                    out.extend(self.finish(EndReason::TargetReached, Some(seat)));
                }
                out
            }
            Item::Debuff => {
                let victim = 1 - seat;
                self.scores[victim] =
                    self.scores[victim].saturating_sub(self.config.debuff_penalty);
                let score = self.scores[victim];
                let them = self.players[victim].clone();
                vec![
                    (
                        Recipient::Player(me.clone()),
                        ServerMessage::DebuffSuccess {
                            message: DEBUFF_SUCCESS_TEXT.to_string(),
                        },
                    ),
                    (
                        Recipient::Player(me),
                        ServerMessage::OpponentScore {
                            player: them.clone(),
                            score,
                        },
                    ),
                    (
                        Recipient::Player(them),
                        ServerMessage::DebuffActivated { score },
                    ),
                ]
            }
        }
    }

    /// Ends the match as a forfeit by `player` (explicit quit or
    /// disconnect). The other player wins.
    pub fn quit(&mut self, player: &str) -> Outbox {
        if self.is_ended() {
            return Vec::new();
        }
        let Some(seat) = self.seat_of(player) else {
            return Vec::new();
        };
        let winner = 1 - seat;
        self.enter_ended(EndReason::Forfeit, Some(winner));
        let scores = self.scores;
        vec![
            (
                Recipient::Player(self.players[seat].clone()),
                ServerMessage::GameEnded {
                    outcome: EndOutcome::QuitLoss,
                    scores,
                },
            ),
            (
                Recipient::Player(self.players[winner].clone()),
                ServerMessage::GameEnded {
                    outcome: EndOutcome::QuitWin,
                    scores,
                },
            ),
        ]
    }

    /// Ends the match because time ran out. Higher score wins.
    pub fn timeout(&mut self) -> Outbox {
        if self.is_ended() {
            return Vec::new();
        }
        let winner = self.leader();
        self.finish(EndReason::Timeout, winner)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// The seat with the strictly higher score, `None` on a tie.
    fn leader(&self) -> Option<usize> {
        match self.scores[0].cmp(&self.scores[1]) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }

    fn enter_ended(&mut self, reason: EndReason, winner: Option<usize>) {
        let winner = winner.map(|seat| self.players[seat].clone());
        let duration = self.started_at.elapsed();
        tracing::info!(
            match_id = %self.id,
            ?reason,
            winner = winner.as_ref().map(Username::as_str).unwrap_or("DRAW"),
            score_host = self.scores[0],
            score_guest = self.scores[1],
            "match ended"
        );
        self.phase = MatchPhase::Ended {
            reason,
            winner,
            duration,
        };
    }

    /// Ends normally and announces the same `GAME_ENDED` to both players.
    fn finish(&mut self, reason: EndReason, winner: Option<usize>) -> Outbox {
        self.enter_ended(reason, winner);
        let outcome = match winner {
            Some(seat) => EndOutcome::Winner(self.players[seat].clone()),
            None => EndOutcome::Draw,
        };
        vec![(
            Recipient::All,
            ServerMessage::GameEnded {
                outcome,
                scores: self.scores,
            },
        )]
    }
}

// =========================================================================
// Tests
// =========================================================================
