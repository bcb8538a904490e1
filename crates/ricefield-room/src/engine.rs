//! Match actor: an isolated Tokio task that owns one [`MatchState`].
//!
//! Each match runs in its own task and is reached only through its
//! [`MatchHandle`]. Clicks, item use, forfeits and the match timer are all
//! serialized through one `select!` loop, so there is never a question of
//! which event "wins" a race: whichever the loop observes first ends the
//! match, and everything after that is ignored by the rules themselves.
//!
//! ```text
//!   connection tasks ──MatchCommand──┐
//!                                    ▼
//!                          ┌──────────────────┐
//!   sleep_until(deadline) ─▶  select! loop    │──▶ PlayerSender (per player)
//!                          └────────┬─────────┘
//!                                   ▼
//!                         JoinHandle<MatchSummary>
//! ```

use std::collections::HashMap;
use std::time::Duration;

use ricefield_protocol::{MatchId, Recipient, ServerMessage, Username};
use ricefield_session::PlayerSender;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::MAX_DURATION_SECS;
use crate::rules::Outbox;
use crate::{Board, Item, MatchConfig, MatchSnapshot, MatchState, MatchSummary, RoomError};

/// Capacity of a match's command channel. Senders wait when it is full.
pub const MATCH_CHANNEL_SIZE: usize = 64;

/// Commands sent to a match actor through its channel.
pub(crate) enum MatchCommand {
    Cell {
        player: Username,
        index: usize,
    },
    UseItem {
        player: Username,
        item: Item,
    },
    Quit {
        player: Username,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
}

/// Handle to a running match actor.
///
/// Cheap to clone. The registry keeps one per live match and clones it out
/// of its lock before awaiting a send.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Returns `true` once the actor has stopped accepting commands.
    pub fn is_finished(&self) -> bool {
        self.sender.is_closed()
    }

    /// Forwards a cell click (fire-and-forget).
    pub async fn resolve_cell(
        &self,
        player: Username,
        index: usize,
    ) -> Result<(), RoomError> {
        self.send(MatchCommand::Cell { player, index }).await
    }

    /// Forwards an item use (fire-and-forget).
    pub async fn use_item(&self, player: Username, item: Item) -> Result<(), RoomError> {
        self.send(MatchCommand::UseItem { player, item }).await
    }

    /// Forfeits on behalf of `player`. Used for explicit quits and for
    /// disconnects alike.
    pub async fn quit(&self, player: Username) -> Result<(), RoomError> {
        self.send(MatchCommand::Quit { player }).await
    }

    /// Requests the current match state.
    pub async fn snapshot(&self) -> Result<MatchSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::MatchUnavailable(self.match_id))
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::MatchUnavailable(self.match_id))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct MatchActor {
    state: MatchState,
    /// Per-player outbound channels.
    senders: HashMap<Username, PlayerSender>,
    receiver: mpsc::Receiver<MatchCommand>,
    deadline: Instant,
}

impl MatchActor {
    /// Runs until the match ends, then returns its summary.
    async fn run(mut self) -> MatchSummary {
        let match_id = self.state.id();
        tracing::info!(
            %match_id,
            host = %self.state.players()[0],
            guest = %self.state.players()[1],
            "match started"
        );
        let start = self.state.start_messages();
        self.dispatch(start);

        let timer = tokio::time::sleep_until(self.deadline);
        tokio::pin!(timer);

        loop {
            let out = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    // Every handle dropped: nobody can reach this match any
                    // more, so settle it as if time ran out.
                    None => self.state.timeout(),
                },
                () = &mut timer => {
                    tracing::debug!(%match_id, "match timer fired");
                    self.state.timeout()
                }
            };
            self.dispatch(out);

            if let Some(summary) = self.state.summary() {
                tracing::info!(%match_id, "match actor stopped");
                return summary;
            }
        }
    }

    fn handle(&mut self, cmd: MatchCommand) -> Outbox {
        match cmd {
            MatchCommand::Cell { player, index } => {
                self.state.resolve_cell(player.as_str(), index)
            }
            MatchCommand::UseItem { player, item } => {
                self.state.use_item(player.as_str(), item)
            }
            MatchCommand::Quit { player } => {
                tracing::info!(match_id = %self.state.id(), %player, "player forfeited");
                self.state.quit(player.as_str())
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
                Vec::new()
            }
        }
    }

    /// Dispatches outbound messages to the correct recipients.
    fn dispatch(&self, msgs: Outbox) {
        for (recipient, msg) in msgs {
            match recipient {
                Recipient::All => {
                    for sender in self.senders.values() {
                        let _ = sender.send(msg.clone());
                    }
                }
                Recipient::Player(player) => self.send_to(&player, msg),
                Recipient::AllExcept(excluded) => {
                    for (player, sender) in &self.senders {
                        if *player != excluded {
                            let _ = sender.send(msg.clone());
                        }
                    }
                }
            }
        }
    }

    /// Sends to one player. Silently drops if their connection is gone.
    fn send_to(&self, player: &Username, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(player) {
            let _ = sender.send(msg);
        }
    }
}

/// Spawns a match actor and returns a handle to it together with the
/// task's `JoinHandle`, which resolves to the [`MatchSummary`] when the
/// match ends.
///
/// `players[0]` is the host. The timer starts now.
pub fn spawn_match(
    match_id: MatchId,
    players: [(Username, PlayerSender); 2],
    board: Board,
    config: MatchConfig,
) -> (MatchHandle, JoinHandle<MatchSummary>) {
    let (tx, rx) = mpsc::channel(MATCH_CHANNEL_SIZE);
    // An unvalidated config can name a duration no clock can reach.
    let now = Instant::now();
    let deadline = now
        .checked_add(config.duration())
        .unwrap_or_else(|| now + Duration::from_secs(MAX_DURATION_SECS));

    let [(host, host_tx), (guest, guest_tx)] = players;
    let senders = HashMap::from([(host.clone(), host_tx), (guest.clone(), guest_tx)]);

    let actor = MatchActor {
        state: MatchState::new(match_id, [host, guest], board, config),
        senders,
        receiver: rx,
        deadline,
    };

    let task = tokio::spawn(actor.run());

    (
        MatchHandle {
            match_id,
            sender: tx,
        },
        task,
    )
}
