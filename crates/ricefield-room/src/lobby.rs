//! Pre-match lobbies: a host and the players who accepted its invitations.

use std::fmt;

use ricefield_protocol::{LobbyId, Username};

use crate::RoomError;

/// Seats in a lobby. A match is always between exactly two players.
pub const LOBBY_CAPACITY: usize = 2;

/// Lifecycle of a lobby.
///
/// ```text
/// Waiting ──→ Dissolved   (host started the match)
///    │
///    └──────→ Closed      (host left or disconnected)
/// ```
///
/// Both end states are terminal; the registry drops the lobby on reaching
/// either one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Waiting,
    Dissolved,
    Closed,
}

impl LobbyState {
    /// Returns `true` if players may still join or leave.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for LobbyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Dissolved => write!(f, "Dissolved"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// What happened when someone left a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The host left. The lobby is closed and `remaining` must be told and
    /// freed.
    Closed { remaining: Vec<Username> },
    /// A non-host left. `remaining` still includes the host.
    Left { remaining: Vec<Username> },
    /// The player wasn't a member (or the lobby is no longer open).
    NotMember,
}

/// A lobby. Pure state: the registry sends all notifications.
#[derive(Debug, Clone)]
pub struct Lobby {
    id: LobbyId,
    host: Username,
    roster: Vec<Username>,
    state: LobbyState,
}

impl Lobby {
    /// Opens a lobby with `host` as its only member.
    pub fn new(id: LobbyId, host: Username) -> Self {
        Self {
            id,
            roster: vec![host.clone()],
            host,
            state: LobbyState::Waiting,
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn host(&self) -> &Username {
        &self.host
    }

    /// Members in join order. The host is always first.
    pub fn roster(&self) -> &[Username] {
        &self.roster
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn contains(&self, player: &str) -> bool {
        self.roster.iter().any(|p| p.as_str() == player)
    }

    pub fn is_full(&self) -> bool {
        self.roster.len() >= LOBBY_CAPACITY
    }

    /// Adds `player` to the roster.
    ///
    /// Returns `Ok(false)` if they were already a member (nothing changes).
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if the lobby is no longer waiting.
    /// - [`RoomError::LobbyFull`] if every seat is taken.
    pub fn join(&mut self, player: Username) -> Result<bool, RoomError> {
        if !self.state.is_open() {
            return Err(RoomError::InvalidState(format!(
                "cannot join lobby in state {}",
                self.state
            )));
        }
        if self.contains(player.as_str()) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(RoomError::LobbyFull(self.id));
        }
        tracing::debug!(lobby_id = %self.id, %player, "lobby member added");
        self.roster.push(player);
        Ok(true)
    }

    /// Removes `player`. The host leaving closes the lobby.
    pub fn leave(&mut self, player: &str) -> LeaveOutcome {
        if !self.state.is_open() || !self.contains(player) {
            return LeaveOutcome::NotMember;
        }
        self.roster.retain(|p| p.as_str() != player);

        if self.host.as_str() == player {
            self.state = LobbyState::Closed;
            LeaveOutcome::Closed {
                remaining: std::mem::take(&mut self.roster),
            }
        } else {
            LeaveOutcome::Left {
                remaining: self.roster.clone(),
            }
        }
    }

    /// Dissolves the lobby into a match, returning the two players with the
    /// host first.
    ///
    /// # Errors
    /// - [`RoomError::NotHost`] if `requester` isn't the host.
    /// - [`RoomError::NotEnoughPlayers`] with fewer than two members.
    /// - [`RoomError::InvalidState`] if the lobby is no longer waiting.
    pub fn request_start(
        &mut self,
        requester: &str,
    ) -> Result<[Username; 2], RoomError> {
        if !self.state.is_open() {
            return Err(RoomError::InvalidState(format!(
                "cannot start lobby in state {}",
                self.state
            )));
        }
        if self.host.as_str() != requester {
            return Err(RoomError::NotHost);
        }
        match self.roster.as_slice() {
            [host, guest] => {
                let players = [host.clone(), guest.clone()];
                self.state = LobbyState::Dissolved;
                Ok(players)
            }
            _ => Err(RoomError::NotEnoughPlayers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Lobby {
        Lobby::new(LobbyId(1), Username::new("host"))
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[test]
    fn test_new_lobby_has_host_only() {
        let l = lobby();
        assert_eq!(l.roster(), &[Username::new("host")]);
        assert_eq!(l.state(), LobbyState::Waiting);
        assert!(!l.is_full());
    }

    #[test]
    fn test_join_adds_member() {
        let mut l = lobby();
        assert!(l.join(Username::new("amy")).unwrap());
        assert!(l.contains("amy"));
        assert!(l.is_full());
    }

    #[test]
    fn test_join_twice_is_noop() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();
        assert!(!l.join(Username::new("amy")).unwrap());
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn test_join_full_lobby_rejected() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();
        let result = l.join(Username::new("bob"));
        assert!(matches!(result, Err(RoomError::LobbyFull(LobbyId(1)))));
    }

    #[test]
    fn test_join_dissolved_lobby_rejected() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();
        l.request_start("host").unwrap();
        assert!(matches!(
            l.join(Username::new("bob")),
            Err(RoomError::InvalidState(_))
        ));
    }

    // =====================================================================
    // leave()
    // =====================================================================

    #[test]
    fn test_leave_guest_keeps_lobby_open() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();

        let outcome = l.leave("amy");

        assert_eq!(
            outcome,
            LeaveOutcome::Left {
                remaining: vec![Username::new("host")]
            }
        );
        assert_eq!(l.state(), LobbyState::Waiting);
    }

    #[test]
    fn test_leave_host_closes_lobby() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();

        let outcome = l.leave("host");

        assert_eq!(
            outcome,
            LeaveOutcome::Closed {
                remaining: vec![Username::new("amy")]
            }
        );
        assert_eq!(l.state(), LobbyState::Closed);
        assert!(l.is_empty());
    }

    #[test]
    fn test_leave_non_member_is_not_member() {
        let mut l = lobby();
        assert_eq!(l.leave("stranger"), LeaveOutcome::NotMember);
    }

    // =====================================================================
    // request_start()
    // =====================================================================

    #[test]
    fn test_request_start_by_guest_is_not_host() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();
        assert!(matches!(l.request_start("amy"), Err(RoomError::NotHost)));
        assert_eq!(l.state(), LobbyState::Waiting);
    }

    #[test]
    fn test_request_start_alone_is_not_enough_players() {
        let mut l = lobby();
        assert!(matches!(
            l.request_start("host"),
            Err(RoomError::NotEnoughPlayers)
        ));
    }

    #[test]
    fn test_request_start_dissolves_with_host_first() {
        let mut l = lobby();
        l.join(Username::new("amy")).unwrap();

        let players = l.request_start("host").unwrap();

        assert_eq!(players, [Username::new("host"), Username::new("amy")]);
        assert_eq!(l.state(), LobbyState::Dissolved);
        assert!(l.request_start("host").is_err());
    }
}
