//! The presence registry: who is online, what they are doing, and every
//! interaction that involves more than one user.
//!
//! # Locking
//!
//! The presence table, the lobby map, the match map and the pending
//! invitations all live in ONE [`RegistryState`] behind ONE
//! `tokio::sync::Mutex`. Every mutation takes that lock, so a presence
//! broadcast always describes a consistent picture: nobody shows up BUSY
//! for a lobby that is already gone.
//!
//! The lock is never held across a gateway call or a send to a match
//! actor. Operations that need either clone what they need (a
//! [`MatchHandle`], a username) out of the lock first. Matches themselves
//! don't touch the registry lock at all while they run; two matches never
//! contend with each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use ricefield_protocol::{
    Credentials, LeaderboardRow, LobbyId, MatchHistoryRow, MatchId, OnlineUser,
    ServerMessage, Username,
};
use ricefield_room::{
    Board, Item, LOBBY_CAPACITY, LeaveOutcome, Lobby, MatchConfig, MatchHandle,
    MatchSummary, RoomError, spawn_match,
};
use ricefield_session::{
    PersistenceGateway, PlayerSender, PresenceEntry, PresenceTable, SessionError,
};
use ricefield_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::RicefieldError;

/// Most rows returned by `GET_LEADERBOARD`.
pub const LEADERBOARD_LIMIT: usize = 20;

/// Most rows returned by `GET_MATCH_HISTORY`.
pub const HISTORY_LIMIT: usize = 20;

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    presence: PresenceTable,
    lobbies: HashMap<LobbyId, Lobby>,
    matches: HashMap<MatchId, MatchHandle>,
    /// Pending `(inviter, invitee)` pairs.
    invitations: HashSet<(Username, Username)>,
}

impl RegistryState {
    fn sender_of(&self, player: &Username) -> Result<PlayerSender, SessionError> {
        self.presence
            .get(player.as_str())
            .map(|entry| entry.sender.clone())
            .ok_or_else(|| SessionError::NotFound(player.clone()))
    }

    /// `true` if `player` is free, or hosts a lobby that still has a seat.
    fn can_invite(&self, player: &Username) -> bool {
        let Some(entry) = self.presence.get(player.as_str()) else {
            return false;
        };
        if entry.current_match.is_some() {
            return false;
        }
        match entry.lobby {
            None => true,
            Some(id) => self
                .lobbies
                .get(&id)
                .is_some_and(|lobby| lobby.host() == player && !lobby.is_full()),
        }
    }

    /// Removes `player` from `lobby_id` and tells whoever is left.
    ///
    /// The host leaving closes the lobby and frees every other member.
    fn leave_lobby(
        &mut self,
        lobby_id: LobbyId,
        player: &Username,
    ) -> Result<(), RoomError> {
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(RoomError::LobbyNotFound(lobby_id))?;
        let host = lobby.host().clone();

        match lobby.leave(player.as_str()) {
            LeaveOutcome::NotMember => return Err(RoomError::NotInLobby(lobby_id)),
            LeaveOutcome::Closed { remaining } => {
                self.lobbies.remove(&lobby_id);
                tracing::info!(%lobby_id, %host, "lobby closed");
                for member in &remaining {
                    let _ = self.presence.set_lobby(member.as_str(), None);
                    self.presence.send_to(
                        member.as_str(),
                        ServerMessage::LobbyClosed { host: host.clone() },
                    );
                }
            }
            LeaveOutcome::Left { remaining } => {
                tracing::info!(%lobby_id, %player, "player left lobby");
                let not_enough_players = remaining.len() < LOBBY_CAPACITY;
                for member in &remaining {
                    self.presence.send_to(
                        member.as_str(),
                        ServerMessage::LobbyPlayerLeft {
                            player: player.clone(),
                            not_enough_players,
                        },
                    );
                    self.presence.send_to(
                        member.as_str(),
                        ServerMessage::LobbyUpdate {
                            lobby_id,
                            host: host.clone(),
                            roster: remaining.clone(),
                        },
                    );
                }
            }
        }

        // The leaver may already be gone from the table (disconnect path).
        let _ = self.presence.set_lobby(player.as_str(), None);
        Ok(())
    }

    /// Clears the match flag of both players and refreshes their cached
    /// totals, then drops the match.
    fn clear_match(&mut self, match_id: MatchId, totals: &[(Username, Option<u64>)]) {
        self.matches.remove(&match_id);
        for (player, total) in totals {
            if let Some(entry) = self.presence.get_mut(player.as_str()) {
                if entry.current_match == Some(match_id) {
                    entry.current_match = None;
                }
                if let Some(total) = total {
                    entry.total_score = *total;
                }
            }
        }
        self.presence.broadcast_presence();
    }
}

/// The single source of truth for online users, lobbies and matches.
///
/// Shared by every connection task as `Arc<PresenceRegistry<G>>`.
/// Validation failures come back as `Err`; the caller renders them into a
/// `SYSTEM_MESSAGE` (or `LOGIN_FAILED` / `REGISTER_FAILED`) for the user who
/// asked. Messages for OTHER users are queued by the registry itself.
pub struct PresenceRegistry<G> {
    state: Mutex<RegistryState>,
    gateway: G,
    match_config: MatchConfig,
    next_lobby_id: AtomicU64,
    next_match_id: AtomicU64,
}

impl<G: PersistenceGateway> PresenceRegistry<G> {
    /// Creates an empty registry. `match_config` should already be
    /// validated.
    pub fn new(gateway: G, match_config: MatchConfig) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            gateway,
            match_config,
            next_lobby_id: AtomicU64::new(1),
            next_match_id: AtomicU64::new(1),
        }
    }

    // -----------------------------------------------------------------------
    // Accounts and presence
    // -----------------------------------------------------------------------

    /// Logs a user in on `connection`.
    ///
    /// On success the user's `LOGIN_SUCCESS` is queued on `sender` BEFORE the
    /// presence broadcast, so the client always learns its own name first.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyOnline`] if the name has a live session.
    /// - [`SessionError::AuthFailed`] on bad credentials.
    /// - [`SessionError::Persistence`] if the gateway is unreachable.
    pub async fn login(
        &self,
        credentials: &Credentials,
        connection: ConnectionId,
        sender: PlayerSender,
    ) -> Result<Username, RicefieldError> {
        let username = Username::new(credentials.username.as_str());
        if self.state.lock().await.presence.contains(username.as_str()) {
            return Err(SessionError::AlreadyOnline(username).into());
        }

        let valid = self
            .gateway
            .authenticate(&credentials.username, &credentials.password)
            .await
            .map_err(SessionError::from)?;
        if !valid {
            return Err(SessionError::AuthFailed.into());
        }

        let total_score = match self.gateway.current_score(&username).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(%username, error = %e, "score lookup failed, showing 0");
                0
            }
        };

        // The name may have been taken while the gateway was working;
        // `insert` re-checks under the lock.
        let mut state = self.state.lock().await;
        let entry = state.presence.insert(PresenceEntry::new(
            username.clone(),
            connection,
            sender,
            total_score,
        ))?;
        entry.send(ServerMessage::LoginSuccess {
            username: username.clone(),
        });
        state.presence.broadcast_presence();
        tracing::info!(%username, conn_id = %connection, "user logged in");
        Ok(username)
    }

    /// Creates an account. Does not log the user in.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`] if the name breaks the rules.
    /// - [`SessionError::UsernameTaken`] if it exists.
    /// - [`SessionError::Persistence`] if the gateway is unreachable.
    pub async fn register(
        &self,
        credentials: &Credentials,
    ) -> Result<Username, RicefieldError> {
        let username = Username::parse(&credentials.username)
            .map_err(SessionError::InvalidUsername)?;
        let created = self
            .gateway
            .register(&username, &credentials.password)
            .await
            .map_err(SessionError::from)?;
        if !created {
            return Err(SessionError::UsernameTaken(username).into());
        }
        tracing::info!(%username, "account registered");
        Ok(username)
    }

    /// Removes a user's presence: used for `LOGOUT` and for a lost socket
    /// alike.
    ///
    /// Idempotent, and a no-op when `connection` no longer owns the name.
    /// A lobby the user was in sees them leave; a match they were playing
    /// ends as their forfeit.
    pub async fn disconnect(&self, username: &Username, connection: ConnectionId) {
        let handle = {
            let mut state = self.state.lock().await;
            let Some(entry) = state.presence.remove(username.as_str(), connection) else {
                return;
            };
            state
                .invitations
                .retain(|(inviter, invitee)| inviter != username && invitee != username);
            if let Some(lobby_id) = entry.lobby {
                if let Err(e) = state.leave_lobby(lobby_id, username) {
                    tracing::debug!(%username, %lobby_id, error = %e, "lobby cleanup skipped");
                }
            }
            state.presence.broadcast_presence();
            entry
                .current_match
                .and_then(|id| state.matches.get(&id).cloned())
        };

        if let Some(handle) = handle {
            tracing::info!(%username, match_id = %handle.match_id(), "player lost mid-match");
            if let Err(e) = handle.quit(username.clone()).await {
                tracing::debug!(%username, error = %e, "forfeit not delivered");
            }
        }
        tracing::info!(%username, conn_id = %connection, "user went offline");
    }

    /// The online roster, sorted by username.
    pub async fn roster(&self) -> Vec<OnlineUser> {
        self.state.lock().await.presence.roster()
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.state.lock().await.presence.contains(username)
    }

    /// The lobby `username` is in, if any.
    pub async fn lobby_of(&self, username: &str) -> Option<LobbyId> {
        self.state.lock().await.presence.get(username)?.lobby
    }

    /// The match `username` is playing, if any.
    pub async fn match_of(&self, username: &str) -> Option<MatchId> {
        self.state.lock().await.presence.get(username)?.current_match
    }

    /// Number of matches still running.
    pub async fn active_matches(&self) -> usize {
        self.state.lock().await.matches.len()
    }

    // -----------------------------------------------------------------------
    // Invitations and lobbies
    // -----------------------------------------------------------------------

    /// Forwards an invitation from `from` to `to`.
    ///
    /// # Errors
    /// [`SessionError::SelfInvitation`], [`SessionError::NotFound`] for an
    /// offline target, [`SessionError::Busy`] for a busy target or an
    /// inviter who cannot host.
    pub async fn invite(&self, from: &Username, to: &Username) -> Result<(), RicefieldError> {
        if from == to {
            return Err(SessionError::SelfInvitation.into());
        }
        let mut state = self.state.lock().await;
        let target = state
            .presence
            .get(to.as_str())
            .ok_or_else(|| SessionError::NotFound(to.clone()))?;
        if target.is_busy() {
            return Err(SessionError::Busy(to.clone()).into());
        }
        if !state.can_invite(from) {
            return Err(SessionError::Busy(from.clone()).into());
        }

        state.invitations.insert((from.clone(), to.clone()));
        state.presence.send_to(
            to.as_str(),
            ServerMessage::GameInvitation {
                inviter: from.clone(),
            },
        );
        tracing::info!(inviter = %from, invitee = %to, "invitation sent");
        Ok(())
    }

    /// Answers a pending invitation.
    ///
    /// A rejection tells the inviter. An acceptance seats the invitee in
    /// the inviter's lobby, opening one (with the inviter as host) if the
    /// inviter has none yet. Newcomers get `LOBBY_READY`, members who were
    /// already waiting get `LOBBY_UPDATE`.
    ///
    /// # Errors
    /// [`SessionError::NoInvitation`] without a pending invitation;
    /// [`SessionError::Busy`] / [`SessionError::NotFound`] when either side
    /// can no longer play together; [`RoomError::LobbyFull`].
    pub async fn respond_invitation(
        &self,
        invitee: &Username,
        inviter: &Username,
        accepted: bool,
    ) -> Result<(), RicefieldError> {
        let mut state = self.state.lock().await;
        if !state.invitations.remove(&(inviter.clone(), invitee.clone())) {
            return Err(SessionError::NoInvitation(inviter.clone()).into());
        }

        if !accepted {
            state.presence.send_to(
                inviter.as_str(),
                ServerMessage::InvitationRejected {
                    invitee: invitee.clone(),
                },
            );
            tracing::info!(%inviter, %invitee, "invitation rejected");
            return Ok(());
        }

        if state
            .presence
            .get(invitee.as_str())
            .is_some_and(PresenceEntry::is_busy)
        {
            return Err(SessionError::Busy(invitee.clone()).into());
        }
        let existing = match state.presence.get(inviter.as_str()) {
            Some(entry) => entry.lobby,
            None => return Err(SessionError::NotFound(inviter.clone()).into()),
        };
        if !state.can_invite(inviter) {
            return Err(SessionError::Busy(inviter.clone()).into());
        }

        let lobby_id = match existing {
            Some(id) => id,
            None => {
                let id = LobbyId(self.next_lobby_id.fetch_add(1, Ordering::Relaxed));
                state.lobbies.insert(id, Lobby::new(id, inviter.clone()));
                state.presence.set_lobby(inviter.as_str(), Some(id))?;
                tracing::info!(lobby_id = %id, host = %inviter, "lobby created");
                id
            }
        };

        let lobby = state
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(RoomError::LobbyNotFound(lobby_id))?;
        lobby.join(invitee.clone())?;
        let host = lobby.host().clone();
        let roster = lobby.roster().to_vec();
        state.presence.set_lobby(invitee.as_str(), Some(lobby_id))?;

        for member in &roster {
            let msg = if existing.is_some() && member != invitee {
                ServerMessage::LobbyUpdate {
                    lobby_id,
                    host: host.clone(),
                    roster: roster.clone(),
                }
            } else {
                ServerMessage::LobbyReady {
                    lobby_id,
                    host: host.clone(),
                    roster: roster.clone(),
                }
            };
            state.presence.send_to(member.as_str(), msg);
        }
        state.presence.broadcast_presence();
        tracing::info!(%lobby_id, %invitee, "invitation accepted");
        Ok(())
    }

    /// Leaves a lobby on request.
    ///
    /// # Errors
    /// [`RoomError::NotInLobby`] if `player` isn't in `lobby_id`.
    pub async fn leave_lobby(
        &self,
        player: &Username,
        lobby_id: LobbyId,
    ) -> Result<(), RicefieldError> {
        let mut state = self.state.lock().await;
        let current = state.presence.get(player.as_str()).and_then(|e| e.lobby);
        if current != Some(lobby_id) {
            return Err(RoomError::NotInLobby(lobby_id).into());
        }
        state.leave_lobby(lobby_id, player)?;
        state.presence.broadcast_presence();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Matches
    // -----------------------------------------------------------------------

    /// Dissolves `lobby_id` into a match, if `requester` is its host and
    /// the roster is full.
    ///
    /// A watcher task awaits the match and then records the result, clears
    /// both players' match flags and rebroadcasts presence.
    ///
    /// # Errors
    /// [`RoomError::LobbyNotFound`], [`RoomError::NotInLobby`],
    /// [`RoomError::NotHost`], [`RoomError::NotEnoughPlayers`].
    pub async fn start_game(
        self: &Arc<Self>,
        requester: &Username,
        lobby_id: LobbyId,
    ) -> Result<MatchId, RicefieldError> {
        let mut state = self.state.lock().await;
        let lobby = state
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(RoomError::LobbyNotFound(lobby_id))?;
        if !lobby.contains(requester.as_str()) {
            return Err(RoomError::NotInLobby(lobby_id).into());
        }
        let [host, guest] = lobby.request_start(requester.as_str())?;
        let seats = [
            (host.clone(), state.sender_of(&host)?),
            (guest.clone(), state.sender_of(&guest)?),
        ];
        state.lobbies.remove(&lobby_id);

        let match_id = MatchId(self.next_match_id.fetch_add(1, Ordering::Relaxed));
        for player in [&host, &guest] {
            state.presence.set_lobby(player.as_str(), None)?;
            state.presence.set_match(player.as_str(), Some(match_id))?;
        }

        let board = Board::generate(&self.match_config, &mut rand::rng());
        let (handle, task) = spawn_match(match_id, seats, board, self.match_config.clone());
        state.matches.insert(match_id, handle);
        state.presence.broadcast_presence();
        drop(state);

        tracing::info!(%lobby_id, %match_id, %host, %guest, "lobby dissolved into match");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            match task.await {
                Ok(summary) => registry.finish_match(summary).await,
                Err(e) => {
                    tracing::error!(%match_id, error = %e, "match task failed");
                    let totals = [(host, None), (guest, None)];
                    registry.state.lock().await.clear_match(match_id, &totals);
                }
            }
        });

        Ok(match_id)
    }

    /// Records a finished match and frees its players.
    ///
    /// A persistence failure is logged and otherwise ignored: the players
    /// are freed either way.
    async fn finish_match(&self, summary: MatchSummary) {
        let match_id = summary.match_id;
        let record = summary.to_record(Utc::now());
        if let Err(e) = self.gateway.record_match_result(&record).await {
            tracing::error!(%match_id, error = %e, "failed to record match result");
        }

        let mut totals = Vec::with_capacity(summary.players.len());
        for player in &summary.players {
            let total = match self.gateway.current_score(player).await {
                Ok(total) => Some(total),
                Err(e) => {
                    tracing::warn!(%player, error = %e, "score refresh failed");
                    None
                }
            };
            totals.push((player.clone(), total));
        }

        self.state.lock().await.clear_match(match_id, &totals);
        tracing::info!(
            %match_id,
            reason = ?summary.reason,
            duration_secs = summary.duration.as_secs(),
            "match settled"
        );
    }

    /// The handle of the match `player` is in.
    pub async fn match_handle(&self, player: &Username) -> Option<MatchHandle> {
        let state = self.state.lock().await;
        let match_id = state.presence.get(player.as_str())?.current_match?;
        state.matches.get(&match_id).cloned()
    }

    /// Forwards a cell click. Ignored outside a match.
    pub async fn resolve_cell(&self, player: &Username, cell: usize) {
        let Some(handle) = self.match_handle(player).await else {
            tracing::debug!(%player, cell, "click outside a match ignored");
            return;
        };
        if let Err(e) = handle.resolve_cell(player.clone(), cell).await {
            tracing::debug!(%player, error = %e, "click not delivered");
        }
    }

    /// Forwards an item use. Ignored outside a match.
    pub async fn use_item(&self, player: &Username, item: Item) {
        let Some(handle) = self.match_handle(player).await else {
            tracing::debug!(%player, ?item, "item use outside a match ignored");
            return;
        };
        if let Err(e) = handle.use_item(player.clone(), item).await {
            tracing::debug!(%player, error = %e, "item use not delivered");
        }
    }

    /// Forfeits the player's match. Ignored outside a match.
    pub async fn quit_match(&self, player: &Username) {
        let Some(handle) = self.match_handle(player).await else {
            tracing::debug!(%player, "quit outside a match ignored");
            return;
        };
        if let Err(e) = handle.quit(player.clone()).await {
            tracing::debug!(%player, error = %e, "quit not delivered");
        }
    }

    // -----------------------------------------------------------------------
    // Messaging and queries
    // -----------------------------------------------------------------------

    /// Relays a private message.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if `to` is offline.
    pub async fn relay_private_message(
        &self,
        from: &Username,
        to: &Username,
        text: String,
    ) -> Result<(), RicefieldError> {
        let state = self.state.lock().await;
        let delivered = state.presence.send_to(
            to.as_str(),
            ServerMessage::IncomingMessage {
                sender: from.clone(),
                text,
            },
        );
        if !delivered {
            return Err(SessionError::NotFound(to.clone()).into());
        }
        Ok(())
    }

    /// The leaderboard, or no rows if the gateway fails.
    pub async fn leaderboard(&self) -> Vec<LeaderboardRow> {
        self.gateway
            .leaderboard(LEADERBOARD_LIMIT)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "leaderboard query failed");
                Vec::new()
            })
    }

    /// `player`'s match history, or no rows if the gateway fails.
    pub async fn match_history(&self, player: &Username) -> Vec<MatchHistoryRow> {
        self.gateway
            .match_history(player, HISTORY_LIMIT)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(%player, error = %e, "match history query failed");
                Vec::new()
            })
    }
}

// =========================================================================
// Tests
// =========================================================================
