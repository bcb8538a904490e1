//! Unified error type for the Ricefield server.

use std::path::PathBuf;

use ricefield_protocol::ProtocolError;
use ricefield_room::RoomError;
use ricefield_session::{GatewayError, SessionError};
use ricefield_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant auto-generates a `From`
/// impl, so the `?` operator converts sub-crate errors automatically.
/// The wrapped variants are `transparent`: their `Display` text is the
/// inner error's, which is what a rejected client sees in its
/// `SYSTEM_MESSAGE`.
#[derive(Debug, thiserror::Error)]
pub enum RicefieldError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Login, registration, presence or invitation failures.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Lobby and match failures.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The persistence gateway failed outside of a login/registration.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A server setting outside the match config is out of range.
    #[error("invalid server config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use ricefield_protocol::{LobbyId, Username};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let ricefield_err: RicefieldError = err.into();
        assert!(matches!(ricefield_err, RicefieldError::Transport(_)));
        assert!(ricefield_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownCommand("DANCE".into());
        let ricefield_err: RicefieldError = err.into();
        assert!(matches!(ricefield_err, RicefieldError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error_keeps_client_text() {
        let err = SessionError::Busy(Username::new("bob"));
        let ricefield_err: RicefieldError = err.into();
        assert!(matches!(ricefield_err, RicefieldError::Session(_)));
        assert_eq!(ricefield_err.to_string(), "User bob is busy");
    }

    #[test]
    fn test_from_room_error_keeps_client_text() {
        let ricefield_err: RicefieldError = RoomError::NotInLobby(LobbyId(3)).into();
        assert!(matches!(ricefield_err, RicefieldError::Room(_)));
        assert_eq!(ricefield_err.to_string(), "You are not in lobby LOBBY_3");
    }

    #[test]
    fn test_from_gateway_error() {
        let err = GatewayError::Unavailable("db down".into());
        let ricefield_err: RicefieldError = err.into();
        assert!(matches!(ricefield_err, RicefieldError::Gateway(_)));
    }
}
