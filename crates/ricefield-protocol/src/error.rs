//! Error types for the protocol layer.
//!
//! Each crate in Ricefield defines its own error enum. A `ProtocolError`
//! always means "this line could not be understood"; it never means a
//! network or game-state problem. The connection handler logs and drops
//! these, the connection itself stays open.

/// Errors that can occur while decoding a client line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The line was empty or only whitespace.
    #[error("empty line")]
    Empty,

    /// The command word is not one the server knows.
    ///
    /// Unknown commands are ignored so that newer clients can talk to
    /// older servers.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command needs a payload after `:` and none was given.
    #[error("{0} requires a payload")]
    MissingPayload(&'static str),

    /// The payload was present but malformed (wrong field count, a cell
    /// index that isn't a number, ...).
    #[error("invalid payload for {command}: {reason}")]
    InvalidPayload {
        command: &'static str,
        reason: String,
    },

    /// A username broke the account-name rules.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// A lobby or match id could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),
}
