//! Transport abstraction layer for Ricefield.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how text lines reach the server, plus the one implementation the game
//! actually speaks: newline-delimited UTF-8 over plain TCP
//! ([`TcpLineTransport`] / [`TcpLineConnection`]).
//!
//! The transport knows nothing about commands or players. It moves whole
//! lines in and out; everything above it deals in strings.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{DEFAULT_MAX_LINE_LENGTH, TcpLineConnection, TcpLineTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Two sockets opened by the same user (one rejected as a duplicate login,
/// say) always carry different ids, which is what lets the presence layer
/// tell "this connection's user" from "that user on some other socket".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that exchanges text lines with its peer.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one line to the remote peer. The terminator is added by
    /// the transport; `line` must not contain one.
    async fn send(&self, line: &str) -> Result<(), Self::Error>;

    /// Receives the next line from the remote peer, without its
    /// terminator.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
