//! Codec trait and the text codec the game speaks.
//!
//! A "codec" (coder/decoder) converts between typed messages and what goes
//! on the wire. The connection handler only knows the [`Codec`] trait, so a
//! different encoding (JSON lines for a web client, say) could be dropped in
//! without touching anything else. This is the strategy pattern: define an
//! interface, swap implementations.

use crate::{ClientCommand, ProtocolError, ServerMessage};

/// Converts client lines into commands and server messages into lines.
///
/// - `Send + Sync` → one codec value is shared by every connection task.
/// - `'static` → it lives as long as the server does.
pub trait Codec: Send + Sync + 'static {
    /// Decodes one line (without its terminator) into a command.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the line is empty, names an unknown
    /// command, or carries a malformed payload.
    fn decode(&self, line: &str) -> Result<ClientCommand, ProtocolError>;

    /// Encodes a message as one line (without its terminator).
    fn encode(&self, msg: &ServerMessage) -> String;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The plain-text `COMMAND:PAYLOAD` codec.
///
/// Stateless and zero-sized: the parsing lives in
/// [`ClientCommand`]'s `FromStr`, the formatting in
/// [`ServerMessage`]'s `Display`.
///
/// ## Example
///
/// ```rust
/// use ricefield_protocol::{ClientCommand, Codec, ServerMessage, TextCodec};
///
/// let codec = TextCodec;
///
/// let cmd = codec.decode("GAME_ACTION:12").unwrap();
/// assert_eq!(cmd, ClientCommand::GameAction { cell: 12 });
///
/// let line = codec.encode(&ServerMessage::BuffActivated { score: 8 });
/// assert_eq!(line, "BUFF_ACTIVATED:+8");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn decode(&self, line: &str) -> Result<ClientCommand, ProtocolError> {
        line.parse()
    }

    fn encode(&self, msg: &ServerMessage) -> String {
        msg.to_string()
    }
}
