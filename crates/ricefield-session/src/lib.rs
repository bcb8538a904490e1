//! Player presence and persistence for Ricefield.
//!
//! This crate handles who is online and where their data lives:
//!
//! 1. **Persistence**: the [`PersistenceGateway`] trait (accounts, score
//!    ledger, leaderboard, history) with an in-memory
//!    ([`InMemoryGateway`]) and a JSON-file ([`FileGateway`]) backend
//! 2. **Presence tracking**: one [`PresenceEntry`] per logged-in user,
//!    held in a [`PresenceTable`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← lobbies and matches address players by username
//!     ↕
//! Session Layer (this)   ← who is online, how to reach them, what they do
//!     ↕
//! Protocol Layer (below) ← Username, ServerMessage, row types
//! ```

mod error;
mod file;
mod gateway;
mod manager;
mod memory;
mod session;

pub use error::SessionError;
pub use file::FileGateway;
pub use gateway::{GatewayError, MatchRecord, PersistenceGateway};
pub use manager::PresenceTable;
pub use memory::InMemoryGateway;
pub use session::{PlayerSender, PresenceEntry};
