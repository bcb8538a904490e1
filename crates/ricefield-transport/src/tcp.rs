//! Newline-delimited TCP transport using `tokio-util` codecs.
//!
//! Inbound frames are split on raw bytes with [`AnyDelimiterCodec`] so a line
//! that is not valid UTF-8 can be dropped on its own instead of failing the
//! stream. Outbound lines go through [`LinesCodec`].
//!
//! Each accepted socket is split into an owned read half and an owned write
//! half, each wrapped in its own framed adapter behind its own lock. The
//! split matters: a connection handler parks inside `recv()` for as long as
//! the client is idle, and that must never stop other tasks from pushing
//! lines out through `send()`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
    LinesCodecError,
};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Longest line accepted from a peer, in bytes, unless configured otherwise.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// A TCP [`Transport`] that frames traffic as newline-terminated lines.
pub struct TcpLineTransport {
    listener: TcpListener,
    max_line_length: usize,
}

impl TcpLineTransport {
    /// Binds a new transport to the given address.
    ///
    /// Lines longer than `max_line_length` bytes are discarded on receipt.
    pub async fn bind(
        addr: &str,
        max_line_length: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP line transport listening");
        Ok(Self {
            listener,
            max_line_length,
        })
    }

    /// Returns the address the listener is bound to. Useful after binding
    /// to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpLineTransport {
    type Connection = TcpLineConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpLineConnection::from_stream(stream, self.max_line_length)?;
        tracing::debug!(id = %conn.id(), %addr, "accepted TCP connection");
        Ok(conn)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single newline-framed TCP connection.
pub struct TcpLineConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, AnyDelimiterCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl TcpLineConnection {
    /// Dials `addr` and wraps the resulting stream. Used by clients and
    /// integration tests.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Self::from_stream(stream, DEFAULT_MAX_LINE_LENGTH)
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(
        stream: TcpStream,
        max_line_length: usize,
    ) -> Result<Self, TransportError> {
        let peer_addr =
            stream.peer_addr().map_err(TransportError::AcceptFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "could not set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );

        Ok(Self {
            id,
            peer_addr,
            reader: Mutex::new(FramedRead::new(
                read_half,
                AnyDelimiterCodec::new_with_max_length(
                    b"\n".to_vec(),
                    Vec::new(),
                    max_line_length,
                ),
            )),
            writer: Mutex::new(FramedWrite::new(write_half, LinesCodec::new())),
        })
    }

    /// Returns the remote address of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for TcpLineConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| TransportError::SendFailed(into_io(e)))
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(frame)) => {
                    let bytes = frame.strip_suffix(b"\r").unwrap_or(&frame[..]);
                    match std::str::from_utf8(bytes) {
                        Ok(line) => return Ok(Some(line.to_string())),
                        Err(e) => {
                            tracing::debug!(id = %self.id, error = %e, "dropping non-UTF-8 line");
                            continue;
                        }
                    }
                }
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    // The codec discards up to the next newline and
                    // resumes, so the connection stays usable.
                    tracing::debug!(id = %self.id, "dropping over-long line");
                    continue;
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => {
                    return Err(TransportError::ReceiveFailed(e));
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .get_mut()
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn into_io(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line too long")
        }
    }
}
