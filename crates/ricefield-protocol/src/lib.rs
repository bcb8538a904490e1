//! Wire protocol for Ricefield.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Username`], [`LobbyId`], [`MatchId`], [`CellKind`], row
//!   types): the values that appear inside lines.
//! - **Commands** ([`ClientCommand`]): what a client can ask for, parsed
//!   from `COMMAND:PAYLOAD` lines.
//! - **Messages** ([`ServerMessage`]): everything the server says back.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): the seam between lines
//!   and typed values.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and the session and
//! match layers. It knows nothing about connections, lobbies or scores; it
//! only knows how to turn text into types and back.
//!
//! ```text
//! Transport (lines) → Protocol (ClientCommand / ServerMessage) → Registry
//! ```

mod codec;
mod command;
mod error;
mod message;
mod types;

pub use codec::{Codec, TextCodec};
pub use command::{ClientCommand, Credentials};
pub use error::ProtocolError;
pub use message::ServerMessage;
pub use types::{
    CellKind, EndOutcome, GrainKind, LeaderboardRow, LobbyId, MatchHistoryRow,
    MatchId, MatchResult, OnlineUser, PowerupKind, PresenceStatus, Recipient,
    Username,
};
