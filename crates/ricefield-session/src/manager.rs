//! The presence table: every logged-in user, keyed by username.
//!
//! Responsibilities:
//! - Enforcing one live session per username
//! - Recording what each user is doing (lobby / match), which drives the
//!   FREE/BUSY status
//! - Composing the online roster and fanning messages out to users
//!
//! # Concurrency note
//!
//! `PresenceTable` is NOT thread-safe by itself: it is a plain `HashMap`.
//! The registry owns it inside its single coarse lock together with the
//! lobby and match maps, so a roster broadcast always reflects one
//! consistent snapshot of all three.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use ricefield_protocol::{
    LobbyId, MatchId, OnlineUser, ServerMessage, Username,
};
use ricefield_transport::ConnectionId;

use crate::{PresenceEntry, SessionError};

/// All presence entries.
///
/// ## Lifecycle
///
/// ```text
/// login ──→ insert() ──→ [Free] ⇄ set_lobby()/set_match() ⇄ [Busy]
///                            │                               │
///                            └──────────→ remove() ←─────────┘
///                                  (logout / disconnect)
/// ```
#[derive(Debug, Default)]
pub struct PresenceTable {
    entries: HashMap<Username, PresenceEntry>,
}

impl PresenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly logged-in user.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyOnline`] if the username already has
    /// an entry. The existing entry is left untouched.
    pub fn insert(
        &mut self,
        entry: PresenceEntry,
    ) -> Result<&PresenceEntry, SessionError> {
        match self.entries.entry(entry.username.clone()) {
            Entry::Occupied(existing) => {
                Err(SessionError::AlreadyOnline(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                tracing::info!(
                    username = %entry.username,
                    conn_id = %entry.connection,
                    "presence created"
                );
                Ok(slot.insert(entry))
            }
        }
    }

    /// Removes `username`'s entry if it belongs to `connection`.
    ///
    /// Returns `None` (and changes nothing) if there is no entry or it
    /// belongs to a different connection. That second case is a late
    /// disconnect from a socket that no longer owns the name.
    pub fn remove(
        &mut self,
        username: &str,
        connection: ConnectionId,
    ) -> Option<PresenceEntry> {
        let current = self.entries.get(username)?.connection;
        if current != connection {
            tracing::warn!(
                %username,
                stale = %connection,
                %current,
                "ignoring removal from a stale connection"
            );
            return None;
        }
        let entry = self.entries.remove(username)?;
        tracing::info!(%username, conn_id = %connection, "presence removed");
        Some(entry)
    }

    pub fn get(&self, username: &str) -> Option<&PresenceEntry> {
        self.entries.get(username)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut PresenceEntry> {
        self.entries.get_mut(username)
    }

    /// Returns `true` if `username` is online.
    pub fn contains(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    /// Number of users online.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records (or clears) the lobby a user is in.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the user is not online.
    pub fn set_lobby(
        &mut self,
        username: &str,
        lobby: Option<LobbyId>,
    ) -> Result<(), SessionError> {
        let entry = self
            .entries
            .get_mut(username)
            .ok_or_else(|| SessionError::NotFound(Username::new(username)))?;
        entry.lobby = lobby;
        Ok(())
    }

    /// Records (or clears) the match a user is playing.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the user is not online.
    pub fn set_match(
        &mut self,
        username: &str,
        current_match: Option<MatchId>,
    ) -> Result<(), SessionError> {
        let entry = self
            .entries
            .get_mut(username)
            .ok_or_else(|| SessionError::NotFound(Username::new(username)))?;
        entry.current_match = current_match;
        Ok(())
    }

    /// The online roster, sorted by username so every client sees the
    /// same order.
    pub fn roster(&self) -> Vec<OnlineUser> {
        let mut rows: Vec<OnlineUser> =
            self.entries.values().map(PresenceEntry::summary).collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        rows
    }

    /// Queues `msg` for one user. Returns `false` if they are offline or
    /// their connection is gone.
    pub fn send_to(&self, username: &str, msg: ServerMessage) -> bool {
        self.entries
            .get(username)
            .is_some_and(|entry| entry.send(msg))
    }

    /// Queues a copy of `msg` for every online user.
    pub fn broadcast(&self, msg: &ServerMessage) {
        for entry in self.entries.values() {
            entry.send(msg.clone());
        }
    }

    /// Sends the current roster to every online user.
    pub fn broadcast_presence(&self) {
        let msg = ServerMessage::OnlineUsers(self.roster());
        self.broadcast(&msg);
    }
}

// =========================================================================
// Tests
// =========================================================================
