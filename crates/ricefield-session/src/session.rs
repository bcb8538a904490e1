//! Presence entries: the server's record of one logged-in user.
//!
//! An entry tracks:
//! - WHO the user is (`username`)
//! - WHICH socket they are on (`connection`)
//! - HOW to reach them (`sender`, drained by that socket's writer task)
//! - WHAT they are doing (`lobby`, `current_match`)

use ricefield_protocol::{
    LobbyId, MatchId, OnlineUser, PresenceStatus, ServerMessage, Username,
};
use ricefield_transport::ConnectionId;
use tokio::sync::mpsc;

/// Channel sender for delivering outbound messages to one connection.
///
/// Unbounded on purpose: producers (the registry under its lock, match
/// actors) must never wait on a slow client. The connection's writer task
/// is the only consumer.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// One authenticated, connected user.
///
/// Created on successful login, owned exclusively by the presence table,
/// destroyed on logout or disconnect.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    /// The account this entry belongs to.
    pub username: Username,

    /// The socket that logged in. Removal is keyed on this too, so a
    /// stale disconnect can never remove a newer login's entry.
    pub connection: ConnectionId,

    /// Outbound queue to the user's socket.
    pub sender: PlayerSender,

    /// Cached persisted total, shown in the online roster. Read at login
    /// and refreshed after each finished match.
    pub total_score: u64,

    /// The lobby the user is in, if any.
    pub lobby: Option<LobbyId>,

    /// The match the user is playing, if any.
    pub current_match: Option<MatchId>,
}

impl PresenceEntry {
    /// Creates an idle entry.
    pub fn new(
        username: Username,
        connection: ConnectionId,
        sender: PlayerSender,
        total_score: u64,
    ) -> Self {
        Self {
            username,
            connection,
            sender,
            total_score,
            lobby: None,
            current_match: None,
        }
    }

    /// Busy iff in a lobby or a match. Busy users cannot be invited.
    pub fn is_busy(&self) -> bool {
        self.lobby.is_some() || self.current_match.is_some()
    }

    pub fn status(&self) -> PresenceStatus {
        if self.is_busy() {
            PresenceStatus::Busy
        } else {
            PresenceStatus::Free
        }
    }

    /// This entry's row in the online roster.
    pub fn summary(&self) -> OnlineUser {
        OnlineUser {
            username: self.username.clone(),
            total_score: self.total_score,
            status: self.status(),
        }
    }

    /// Queues a message for this user. Returns `false` if their connection
    /// is already gone; callers treat that as "dropped", never as an error.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }
}
