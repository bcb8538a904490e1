//! Server → client messages.
//!
//! [`ServerMessage`] is the typed form of every line the server emits. Its
//! `Display` implementation is the wire encoding, so producing a line is
//! just `msg.to_string()`.

use std::fmt;

use crate::{
    CellKind, EndOutcome, LeaderboardRow, LobbyId, MatchHistoryRow, MatchId,
    OnlineUser, Username,
};

/// A message from the server to one client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    LoginSuccess { username: Username },
    LoginFailed { reason: String },
    RegisterSuccess { username: Username },
    RegisterFailed { reason: String },

    /// The full online roster. Sent on request and after every change in
    /// who is online or who is busy.
    OnlineUsers(Vec<OnlineUser>),

    GameInvitation { inviter: Username },
    InvitationRejected { invitee: Username },

    /// Sent to every member when a lobby forms or someone joins it.
    LobbyReady {
        lobby_id: LobbyId,
        host: Username,
        roster: Vec<Username>,
    },
    /// Sent to the remaining members when the roster shrinks.
    LobbyUpdate {
        lobby_id: LobbyId,
        host: Username,
        roster: Vec<Username>,
    },
    LobbyPlayerLeft {
        player: Username,
        not_enough_players: bool,
    },
    /// The host left and the lobby is gone.
    LobbyClosed { host: Username },

    /// Sent to each player individually; `opponent` differs per recipient.
    GameStarted {
        match_id: MatchId,
        opponent: Username,
        duration_secs: u64,
        rice_cells: Vec<usize>,
    },
    GrainResult {
        cell: usize,
        kind: CellKind,
        score: u32,
    },
    OpponentGrainClick { cell: usize, kind: CellKind },
    OpponentScore { player: Username, score: u32 },
    /// The buff user's new score.
    BuffActivated { score: u32 },
    DebuffSuccess { message: String },
    /// The debuff victim's new score.
    DebuffActivated { score: u32 },
    /// Scores are always in match order (host first), whoever receives it.
    GameEnded {
        outcome: EndOutcome,
        scores: [u32; 2],
    },

    IncomingMessage { sender: Username, text: String },
    SystemMessage(String),

    Leaderboard(Vec<LeaderboardRow>),
    MatchHistory(Vec<MatchHistoryRow>),
}

impl ServerMessage {
    /// Shorthand for a `SYSTEM_MESSAGE` notice.
    pub fn system(text: impl Into<String>) -> Self {
        Self::SystemMessage(text.into())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginSuccess { username } => {
                write!(f, "LOGIN_SUCCESS:{username}")
            }
            Self::LoginFailed { reason } => write!(f, "LOGIN_FAILED:{reason}"),
            Self::RegisterSuccess { username } => {
                write!(f, "REGISTER_SUCCESS:{username}")
            }
            Self::RegisterFailed { reason } => {
                write!(f, "REGISTER_FAILED:{reason}")
            }
            Self::OnlineUsers(rows) => {
                f.write_str("ONLINE_USERS:")?;
                write_rows(f, rows)
            }
            Self::GameInvitation { inviter } => {
                write!(f, "GAME_INVITATION:{inviter}")
            }
            Self::InvitationRejected { invitee } => {
                write!(f, "INVITATION_REJECTED:{invitee}")
            }
            Self::LobbyReady {
                lobby_id,
                host,
                roster,
            } => {
                write!(f, "LOBBY_READY:{lobby_id}:{host}:")?;
                write_joined(f, roster, ",")
            }
            Self::LobbyUpdate {
                lobby_id,
                host,
                roster,
            } => {
                write!(f, "LOBBY_UPDATE:{lobby_id}:{host}:")?;
                write_joined(f, roster, ",")
            }
            Self::LobbyPlayerLeft {
                player,
                not_enough_players,
            } => {
                write!(f, "LOBBY_PLAYER_LEFT:{player}")?;
                if *not_enough_players {
                    f.write_str(":NOT_ENOUGH_PLAYERS")?;
                }
                Ok(())
            }
            Self::LobbyClosed { host } => write!(f, "LOBBY_CLOSED:{host}"),
            Self::GameStarted {
                match_id,
                opponent,
                duration_secs,
                rice_cells,
            } => {
                write!(f, "GAME_STARTED:{match_id},{opponent},{duration_secs},")?;
                write_joined(f, rice_cells, ":")
            }
            Self::GrainResult { cell, kind, score } => {
                write!(f, "GRAIN_RESULT:{cell},{kind},{score}")
            }
            Self::OpponentGrainClick { cell, kind } => {
                write!(f, "OPPONENT_GRAIN_CLICK:{cell},{kind}")
            }
            Self::OpponentScore { player, score } => {
                write!(f, "OPPONENT_SCORE:{player},{score}")
            }
            Self::BuffActivated { score } => write!(f, "BUFF_ACTIVATED:+{score}"),
            Self::DebuffSuccess { message } => {
                write!(f, "DEBUFF_SUCCESS:{message}")
            }
            Self::DebuffActivated { score } => {
                write!(f, "DEBUFF_ACTIVATED:-{score}")
            }
            Self::GameEnded { outcome, scores } => {
                write!(f, "GAME_ENDED:{outcome},{},{}", scores[0], scores[1])
            }
            Self::IncomingMessage { sender, text } => {
                write!(f, "INCOMING_MESSAGE:{sender}:{text}")
            }
            Self::SystemMessage(text) => write!(f, "SYSTEM_MESSAGE:{text}"),
            Self::Leaderboard(rows) => {
                f.write_str("LEADERBOARD:")?;
                write_rows(f, rows)
            }
            Self::MatchHistory(rows) => {
                f.write_str("MATCH_HISTORY:")?;
                write_rows(f, rows)
            }
        }
    }
}

/// Writes each row followed by `;` (including the last one).
fn write_rows<T: fmt::Display>(f: &mut fmt::Formatter<'_>, rows: &[T]) -> fmt::Result {
    for row in rows {
        write!(f, "{row};")?;
    }
    Ok(())
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    sep: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
