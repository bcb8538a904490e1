//! `RicefieldServer` builder and server loop.
//!
//! This is the entry point for running a Ricefield server. It ties
//! together all the layers: transport → protocol → session → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ricefield_protocol::{Codec, TextCodec};
use ricefield_room::MatchConfig;
use ricefield_session::PersistenceGateway;
use ricefield_transport::{TcpLineTransport, Transport};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::registry::PresenceRegistry;
use crate::RicefieldError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<G, C> {
    pub(crate) registry: Arc<PresenceRegistry<G>>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Ricefield server.
///
/// # Example
///
/// ```rust,no_run
/// use ricefield::prelude::*;
///
/// # async fn run() -> Result<(), RicefieldError> {
/// let server = RicefieldServerBuilder::new()
///     .bind("0.0.0.0:8888")
///     .build(InMemoryGateway::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RicefieldServerBuilder {
    config: ServerConfig,
}

impl RicefieldServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the rules for every match.
    pub fn match_config(mut self, game: MatchConfig) -> Self {
        self.config.game = game;
        self
    }

    /// Drops connections that stay silent for `secs` seconds. `0` disables.
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = secs;
        self
    }

    /// Validates the config, binds the listener and returns a server ready
    /// to [`run()`](RicefieldServer::run).
    ///
    /// # Errors
    /// An invalid config, or a bind failure.
    pub async fn build<G: PersistenceGateway>(
        self,
        gateway: G,
    ) -> Result<RicefieldServer<G, TextCodec>, RicefieldError> {
        self.config.validate()?;
        let transport =
            TcpLineTransport::bind(&self.config.bind_addr, self.config.max_line_length)
                .await?;

        let registry = Arc::new(PresenceRegistry::new(gateway, self.config.game.clone()));
        let state = Arc::new(ServerState {
            registry,
            codec: TextCodec,
            idle_timeout: self.config.idle_timeout(),
        });

        Ok(RicefieldServer { transport, state })
    }
}

impl Default for RicefieldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Ricefield server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RicefieldServer<G, C> {
    transport: TcpLineTransport,
    state: Arc<ServerState<G, C>>,
}

impl<G, C> RicefieldServer<G, C>
where
    G: PersistenceGateway,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry behind this server. Useful to inspect presence from
    /// tests or an admin task.
    pub fn registry(&self) -> Arc<PresenceRegistry<G>> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop.
    ///
    /// Spawns one handler task per accepted connection. Runs until the
    /// future is dropped; accept errors are logged and skipped.
    pub async fn run(mut self) -> Result<(), RicefieldError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Ricefield server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
