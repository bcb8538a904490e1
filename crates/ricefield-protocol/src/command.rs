//! Client → server commands.
//!
//! A client line has the shape `COMMAND` or `COMMAND:PAYLOAD`. The line is
//! split on the FIRST `:` only, because some payloads (a private message,
//! for instance) legitimately contain more colons.

use std::fmt;
use std::str::FromStr;

use crate::{LobbyId, ProtocolError, Username};

/// A `user,pass` pair sent with `LOGIN` and `REGISTER`.
///
/// The username is kept raw here. Login looks it up as-is, and registration
/// validates it with [`Username::parse`], so the two can report different
/// failures.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    fn parse(
        command: &'static str,
        payload: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let payload = require(command, payload)?;
        let mut fields = payload.split(',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(user), Some(pass), None)
                if !user.is_empty() && !pass.is_empty() =>
            {
                Ok(Self {
                    username: user.to_string(),
                    password: pass.to_string(),
                })
            }
            _ => Err(ProtocolError::InvalidPayload {
                command,
                reason: "expected user,pass".into(),
            }),
        }
    }
}

// Never print the password, not even at debug level.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Login(Credentials),
    Register(Credentials),
    /// Drops the authenticated identity but keeps the socket open.
    Logout,
    GetOnlineUsers,
    Invite { target: Username },
    AcceptInvitation { inviter: Username },
    RejectInvitation { inviter: Username },
    StartGame { lobby_id: LobbyId },
    LeaveLobby { lobby_id: LobbyId },
    GameAction { cell: usize },
    UseBuff,
    UseDebuff,
    QuitGame,
    PrivateMessage { target: Username, text: String },
    GetLeaderboard,
    GetMatchHistory,
}

impl ClientCommand {
    /// The wire name of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "LOGIN",
            Self::Register(_) => "REGISTER",
            Self::Logout => "LOGOUT",
            Self::GetOnlineUsers => "GET_ONLINE_USERS",
            Self::Invite { .. } => "INVITE",
            Self::AcceptInvitation { .. } => "ACCEPT_INVITATION",
            Self::RejectInvitation { .. } => "REJECT_INVITATION",
            Self::StartGame { .. } => "START_GAME",
            Self::LeaveLobby { .. } => "LEAVE_LOBBY",
            Self::GameAction { .. } => "GAME_ACTION",
            Self::UseBuff => "USE_BUFF",
            Self::UseDebuff => "USE_DEBUFF",
            Self::QuitGame => "QUIT_GAME",
            Self::PrivateMessage { .. } => "PRIVATE_MESSAGE",
            Self::GetLeaderboard => "GET_LEADERBOARD",
            Self::GetMatchHistory => "GET_MATCH_HISTORY",
        }
    }

    /// Returns `true` for the commands accepted before login.
    pub fn is_pre_login(&self) -> bool {
        matches!(self, Self::Login(_) | Self::Register(_))
    }
}

impl FromStr for ClientCommand {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (command, payload) = match line.split_once(':') {
            Some((command, payload)) => (command.trim(), Some(payload)),
            None => (line.trim(), None),
        };

        let cmd = match command {
            "LOGIN" => Self::Login(Credentials::parse("LOGIN", payload)?),
            "REGISTER" => {
                Self::Register(Credentials::parse("REGISTER", payload)?)
            }
            "LOGOUT" => Self::Logout,
            "GET_ONLINE_USERS" => Self::GetOnlineUsers,
            "INVITE" => Self::Invite {
                target: username("INVITE", payload)?,
            },
            "ACCEPT_INVITATION" => Self::AcceptInvitation {
                inviter: username("ACCEPT_INVITATION", payload)?,
            },
            "REJECT_INVITATION" => Self::RejectInvitation {
                inviter: username("REJECT_INVITATION", payload)?,
            },
            "START_GAME" => Self::StartGame {
                lobby_id: require("START_GAME", payload)?.trim().parse()?,
            },
            "LEAVE_LOBBY" => Self::LeaveLobby {
                lobby_id: require("LEAVE_LOBBY", payload)?.trim().parse()?,
            },
            "GAME_ACTION" => {
                let raw = require("GAME_ACTION", payload)?.trim();
                let cell = raw.parse().map_err(|_| {
                    ProtocolError::InvalidPayload {
                        command: "GAME_ACTION",
                        reason: format!("cell index {raw:?} is not a number"),
                    }
                })?;
                Self::GameAction { cell }
            }
            "USE_BUFF" => Self::UseBuff,
            "USE_DEBUFF" => Self::UseDebuff,
            "QUIT_GAME" => Self::QuitGame,
            "PRIVATE_MESSAGE" => {
                let payload = require("PRIVATE_MESSAGE", payload)?;
                let (target, text) = payload.split_once(':').ok_or_else(|| {
                    ProtocolError::InvalidPayload {
                        command: "PRIVATE_MESSAGE",
                        reason: "expected target:text".into(),
                    }
                })?;
                let target = target.trim();
                if target.is_empty() {
                    return Err(ProtocolError::InvalidPayload {
                        command: "PRIVATE_MESSAGE",
                        reason: "empty target".into(),
                    });
                }
                Self::PrivateMessage {
                    target: Username::new(target),
                    text: text.to_string(),
                }
            }
            "GET_LEADERBOARD" => Self::GetLeaderboard,
            "GET_MATCH_HISTORY" => Self::GetMatchHistory,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        Ok(cmd)
    }
}

fn require<'a>(
    command: &'static str,
    payload: Option<&'a str>,
) -> Result<&'a str, ProtocolError> {
    match payload {
        Some(p) if !p.trim().is_empty() => Ok(p),
        _ => Err(ProtocolError::MissingPayload(command)),
    }
}

fn username(
    command: &'static str,
    payload: Option<&str>,
) -> Result<Username, ProtocolError> {
    Ok(Username::new(require(command, payload)?.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<ClientCommand, ProtocolError> {
        line.parse()
    }

    #[test]
    fn test_parse_login_splits_credentials() {
        let cmd = parse("LOGIN:alice,secret").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Login(Credentials {
                username: "alice".into(),
                password: "secret".into(),
            })
        );
        assert!(cmd.is_pre_login());
    }

    #[test]
    fn test_parse_login_wrong_field_count_rejected() {
        assert!(matches!(
            parse("LOGIN:alice"),
            Err(ProtocolError::InvalidPayload { command: "LOGIN", .. })
        ));
        assert!(parse("LOGIN:alice,pw,extra").is_err());
        assert!(parse("REGISTER:,pw").is_err());
    }

    #[test]
    fn test_parse_login_missing_payload_rejected() {
        assert!(matches!(
            parse("LOGIN"),
            Err(ProtocolError::MissingPayload("LOGIN"))
        ));
    }

    #[test]
    fn test_parse_strips_carriage_return() {
        assert_eq!(parse("QUIT_GAME\r").unwrap(), ClientCommand::QuitGame);
        assert_eq!(
            parse("GAME_ACTION:7\r\n").unwrap(),
            ClientCommand::GameAction { cell: 7 }
        );
    }

    #[test]
    fn test_parse_empty_line_rejected() {
        assert!(matches!(parse(""), Err(ProtocolError::Empty)));
        assert!(matches!(parse("   "), Err(ProtocolError::Empty)));
    }

    #[test]
    fn test_parse_unknown_command_reports_word() {
        match parse("DANCE:now") {
            Err(ProtocolError::UnknownCommand(word)) => assert_eq!(word, "DANCE"),
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_game_action_non_numeric_rejected() {
        assert!(matches!(
            parse("GAME_ACTION:abc"),
            Err(ProtocolError::InvalidPayload { command: "GAME_ACTION", .. })
        ));
        assert!(parse("GAME_ACTION:-1").is_err());
    }

    #[test]
    fn test_parse_private_message_keeps_colons_in_text() {
        let cmd = parse("PRIVATE_MESSAGE:bob:see you at 10:30").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::PrivateMessage {
                target: Username::new("bob"),
                text: "see you at 10:30".into(),
            }
        );
    }

    #[test]
    fn test_parse_private_message_without_text_separator_rejected() {
        assert!(parse("PRIVATE_MESSAGE:bob").is_err());
        assert!(parse("PRIVATE_MESSAGE::hello").is_err());
    }

    #[test]
    fn test_parse_lobby_commands_accept_wire_ids() {
        assert_eq!(
            parse("START_GAME:LOBBY_4").unwrap(),
            ClientCommand::StartGame { lobby_id: LobbyId(4) }
        );
        assert_eq!(
            parse("LEAVE_LOBBY:4").unwrap(),
            ClientCommand::LeaveLobby { lobby_id: LobbyId(4) }
        );
        assert!(parse("START_GAME:lobby").is_err());
    }

    #[test]
    fn test_parse_invitation_commands_trim_target() {
        assert_eq!(
            parse("INVITE: bob ").unwrap(),
            ClientCommand::Invite { target: Username::new("bob") }
        );
        assert_eq!(
            parse("ACCEPT_INVITATION:amy").unwrap(),
            ClientCommand::AcceptInvitation { inviter: Username::new("amy") }
        );
        assert_eq!(
            parse("REJECT_INVITATION:amy").unwrap(),
            ClientCommand::RejectInvitation { inviter: Username::new("amy") }
        );
    }

    #[test]
    fn test_parse_payloadless_commands() {
        let cases = [
            ("GET_ONLINE_USERS", ClientCommand::GetOnlineUsers),
            ("USE_BUFF", ClientCommand::UseBuff),
            ("USE_DEBUFF", ClientCommand::UseDebuff),
            ("LOGOUT", ClientCommand::Logout),
            ("GET_LEADERBOARD", ClientCommand::GetLeaderboard),
            ("GET_MATCH_HISTORY", ClientCommand::GetMatchHistory),
        ];
        for (line, expected) in cases {
            let cmd = parse(line).unwrap();
            assert_eq!(cmd.name(), line);
            assert_eq!(cmd, expected);
        }
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }
}
