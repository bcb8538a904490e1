//! Per-connection handler: login, command routing and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the connection's outbound queue
//!   2. Loop: receive a line → decode → dispatch to the registry
//!   3. On close, error or idle timeout: run the disconnect path once

use std::sync::Arc;
use std::time::Duration;

use ricefield_protocol::{ClientCommand, Codec, ServerMessage, Username};
use ricefield_room::Item;
use ricefield_session::{PersistenceGateway, PlayerSender};
use ricefield_transport::{Connection, ConnectionId, TcpLineConnection};
use tokio::sync::mpsc;

use crate::RicefieldError;
use crate::registry::PresenceRegistry;
use crate::server::ServerState;

/// How long a closing connection waits for queued replies to go out.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Drop guard that owns the authenticated identity of a connection.
///
/// `release()` is the normal path. `Drop` covers a handler that unwinds
/// before reaching it; since `Drop` is synchronous, it spawns a
/// fire-and-forget task for the async disconnect.
struct SessionGuard<G: PersistenceGateway> {
    conn_id: ConnectionId,
    username: Option<Username>,
    registry: Arc<PresenceRegistry<G>>,
}

impl<G: PersistenceGateway> SessionGuard<G> {
    /// Runs the disconnect path for the current identity, if any.
    async fn release(&mut self) {
        if let Some(username) = self.username.take() {
            self.registry.disconnect(&username, self.conn_id).await;
        }
    }
}

impl<G: PersistenceGateway> Drop for SessionGuard<G> {
    fn drop(&mut self) {
        let Some(username) = self.username.take() else {
            return;
        };
        let registry = Arc::clone(&self.registry);
        let conn_id = self.conn_id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    registry.disconnect(&username, conn_id).await;
                });
            }
            Err(_) => {
                tracing::warn!(%username, %conn_id, "no runtime left to run disconnect");
            }
        }
    }
}

/// The state one connection task carries between lines.
struct ConnectionSession<G: PersistenceGateway, C: Codec> {
    state: Arc<ServerState<G, C>>,
    conn_id: ConnectionId,
    /// Queue drained by the writer task. Cloned into the presence entry on
    /// login so other tasks can reach this user.
    sender: PlayerSender,
    guard: SessionGuard<G>,
}

impl<G: PersistenceGateway, C: Codec> ConnectionSession<G, C> {
    fn reply(&self, msg: ServerMessage) {
        // Only fails once the writer is gone, and then nobody is listening.
        let _ = self.sender.send(msg);
    }

    fn reply_error(&self, e: &RicefieldError) {
        self.reply(ServerMessage::system(e.to_string()));
    }

    async fn dispatch(&mut self, cmd: ClientCommand) {
        let Some(username) = self.guard.username.clone() else {
            self.dispatch_anonymous(cmd).await;
            return;
        };
        tracing::debug!(%username, command = cmd.name(), "dispatching");

        let registry = &self.state.registry;
        let result = match cmd {
            ClientCommand::Login(_) => {
                self.reply(ServerMessage::LoginFailed {
                    reason: "Already logged in".into(),
                });
                Ok(())
            }
            ClientCommand::Register(credentials) => {
                self.register(credentials).await;
                Ok(())
            }
            ClientCommand::Logout => {
                self.guard.release().await;
                self.reply(ServerMessage::system("Logged out"));
                Ok(())
            }
            ClientCommand::GetOnlineUsers => {
                self.reply(ServerMessage::OnlineUsers(registry.roster().await));
                Ok(())
            }
            ClientCommand::Invite { target } => registry.invite(&username, &target).await,
            ClientCommand::AcceptInvitation { inviter } => {
                registry.respond_invitation(&username, &inviter, true).await
            }
            ClientCommand::RejectInvitation { inviter } => {
                registry.respond_invitation(&username, &inviter, false).await
            }
            ClientCommand::StartGame { lobby_id } => {
                registry.start_game(&username, lobby_id).await.map(|_| ())
            }
            ClientCommand::LeaveLobby { lobby_id } => {
                registry.leave_lobby(&username, lobby_id).await
            }
            ClientCommand::GameAction { cell } => {
                registry.resolve_cell(&username, cell).await;
                Ok(())
            }
            ClientCommand::UseBuff => {
                registry.use_item(&username, Item::Buff).await;
                Ok(())
            }
            ClientCommand::UseDebuff => {
                registry.use_item(&username, Item::Debuff).await;
                Ok(())
            }
            ClientCommand::QuitGame => {
                registry.quit_match(&username).await;
                Ok(())
            }
            ClientCommand::PrivateMessage { target, text } => {
                registry.relay_private_message(&username, &target, text).await
            }
            ClientCommand::GetLeaderboard => {
                self.reply(ServerMessage::Leaderboard(registry.leaderboard().await));
                Ok(())
            }
            ClientCommand::GetMatchHistory => {
                let rows = registry.match_history(&username).await;
                self.reply(ServerMessage::MatchHistory(rows));
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(%username, error = %e, "command rejected");
            self.reply_error(&e);
        }
    }

    /// Before login only `LOGIN` and `REGISTER` do anything.
    async fn dispatch_anonymous(&mut self, cmd: ClientCommand) {
        if !cmd.is_pre_login() {
            tracing::debug!(
                conn_id = %self.conn_id,
                command = cmd.name(),
                "ignoring command before login"
            );
            return;
        }
        match cmd {
            ClientCommand::Login(credentials) => {
                let registry = &self.state.registry;
                match registry
                    .login(&credentials, self.conn_id, self.sender.clone())
                    .await
                {
                    Ok(username) => self.guard.username = Some(username),
                    Err(e) => {
                        tracing::info!(
                            conn_id = %self.conn_id,
                            username = %credentials.username,
                            reason = %e,
                            "login failed"
                        );
                        self.reply(ServerMessage::LoginFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
            ClientCommand::Register(credentials) => self.register(credentials).await,
            _ => {}
        }
    }

    async fn register(&self, credentials: ricefield_protocol::Credentials) {
        let msg = match self.state.registry.register(&credentials).await {
            Ok(username) => ServerMessage::RegisterSuccess { username },
            Err(e) => ServerMessage::RegisterFailed {
                reason: e.to_string(),
            },
        };
        self.reply(msg);
    }
}

/// Drains the outbound queue onto the socket until either side goes away.
async fn write_loop<C: Codec>(
    conn: Arc<TcpLineConnection>,
    codec: C,
    mut outbox: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = outbox.recv().await {
        let line = codec.encode(&msg);
        if let Err(e) = conn.send(&line).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, C>(
    conn: TcpLineConnection,
    state: Arc<ServerState<G, C>>,
) -> Result<(), RicefieldError>
where
    G: PersistenceGateway,
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (sender, outbox) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        state.codec.clone(),
        outbox,
    ));

    let mut session = ConnectionSession {
        conn_id,
        sender,
        guard: SessionGuard {
            conn_id,
            username: None,
            registry: Arc::clone(&state.registry),
        },
        state: Arc::clone(&state),
    };

    let mut outcome = Ok(());
    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%conn_id, "connection idle for too long");
                    break;
                }
            },
            None => conn.recv().await,
        };

        let line = match received {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                outcome = Err(e.into());
                break;
            }
        };

        let cmd = match state.codec.decode(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "dropping undecodable line");
                continue;
            }
        };
        session.dispatch(cmd).await;
    }

    session.guard.release().await;
    // Dropping the session drops its sender; the writer flushes what is
    // queued and stops once no other task holds a clone.
    drop(session);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(%conn_id, "writer still busy, aborting");
        writer.abort();
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    outcome
}
