//! Error types for the lobby and match layer.

use ricefield_protocol::{LobbyId, MatchId};

/// Errors that can occur during lobby and match operations.
///
/// The `Display` text of the lobby variants is what a client sees in the
/// `SYSTEM_MESSAGE` that rejects its request.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The lobby does not exist (never did, or already started/closed).
    #[error("Lobby {0} not found")]
    LobbyNotFound(LobbyId),

    /// The player asked to act on a lobby they are not in.
    #[error("You are not in lobby {0}")]
    NotInLobby(LobbyId),

    /// Only the host may start a lobby's match.
    #[error("Only the host can start the game")]
    NotHost,

    /// A match needs a full roster.
    #[error("Not enough players to start")]
    NotEnoughPlayers,

    /// The lobby has no free seat.
    #[error("Lobby {0} is full")]
    LobbyFull(LobbyId),

    /// The lobby is in a state that doesn't allow this operation,
    /// e.g. joining one that already dissolved into a match.
    #[error("invalid lobby state for this operation: {0}")]
    InvalidState(String),

    /// The match actor has finished or its command channel is closed.
    #[error("match {0} is unavailable")]
    MatchUnavailable(MatchId),

    /// A [`MatchConfig`](crate::MatchConfig) failed validation.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}
