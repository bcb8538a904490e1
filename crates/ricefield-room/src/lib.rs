//! Lobbies and matches for Ricefield.
//!
//! A lobby is plain state owned by the registry. A match runs as an
//! isolated Tokio task (actor model) that owns its board, scores and timer.
//!
//! # Key types
//!
//! - [`Lobby`]: host, roster and the `Waiting → Dissolved | Closed` lifecycle
//! - [`Board`]: the randomly generated row of RICE/CHAFF cells
//! - [`MatchState`]: pure scoring and end-of-match rules
//! - [`MatchHandle`]: send clicks, item use and forfeits to a running match
//! - [`MatchConfig`]: board layout, target score, duration

mod board;
mod config;
mod engine;
mod error;
mod lobby;
mod rules;

pub use board::{Board, Cell};
pub use config::{ChaffRule, MAX_DURATION_SECS, MatchConfig};
pub use engine::{MATCH_CHANNEL_SIZE, MatchHandle, spawn_match};
pub use error::RoomError;
pub use lobby::{LOBBY_CAPACITY, LeaveOutcome, Lobby, LobbyState};
pub use rules::{
    DEBUFF_SUCCESS_TEXT, EndReason, Inventory, Item, MatchPhase, MatchSnapshot,
    MatchState, MatchSummary, Outbox,
};
