//! # Ricefield
//!
//! Server core for a two-player, timed rice-picking game played over a
//! line-based TCP protocol.
//!
//! Players log in, invite each other into a lobby, and the host starts a
//! match. A match is a row of RICE and CHAFF cells, some carrying buffs or
//! debuffs; the first player to reach the target score, or the leader once
//! every rice cell is claimed or the clock runs out, wins. Results go to a
//! [`PersistenceGateway`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ricefield::prelude::*;
//!
//! # async fn run() -> Result<(), RicefieldError> {
//! let server = RicefieldServerBuilder::new()
//!     .bind("0.0.0.0:8888")
//!     .build(InMemoryGateway::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use config::ServerConfig;
pub use error::RicefieldError;
pub use registry::{HISTORY_LIMIT, LEADERBOARD_LIMIT, PresenceRegistry};
pub use server::{RicefieldServer, RicefieldServerBuilder};

pub use ricefield_session::PersistenceGateway;

/// Convenience re-exports for server binaries and tests.
pub mod prelude {
    pub use crate::{
        PresenceRegistry, RicefieldError, RicefieldServer, RicefieldServerBuilder,
        ServerConfig,
    };
    pub use ricefield_protocol::{ClientCommand, Credentials, ServerMessage, Username};
    pub use ricefield_room::{ChaffRule, MatchConfig};
    pub use ricefield_session::{
        FileGateway, GatewayError, InMemoryGateway, MatchRecord, PersistenceGateway,
    };
}
