//! Error types for the session layer.

use ricefield_protocol::{ProtocolError, Username};

use crate::GatewayError;

/// Errors that can occur while establishing or tracking a player's
/// presence.
///
/// The `Display` text of the login and registration variants is exactly
/// what the client sees after `LOGIN_FAILED:` / `REGISTER_FAILED:`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown user or wrong password. The two are deliberately not
    /// distinguished.
    #[error("Invalid credentials")]
    AuthFailed,

    /// The user already has a live presence entry on another connection.
    /// One user, one session.
    #[error("User already online")]
    AlreadyOnline(Username),

    /// Registration with a name that is already taken.
    #[error("Username already exists")]
    UsernameTaken(Username),

    /// Registration with a name that breaks the account-name rules.
    #[error("Invalid username")]
    InvalidUsername(#[source] ProtocolError),

    /// No presence entry exists for this user.
    #[error("User {0} is not online")]
    NotFound(Username),

    /// The user is in a lobby or a match and cannot take an invitation.
    #[error("User {0} is busy")]
    Busy(Username),

    #[error("You cannot invite yourself")]
    SelfInvitation,

    /// Accepting or rejecting an invitation that was never sent (or was
    /// withdrawn when the inviter went away).
    #[error("No pending invitation from {0}")]
    NoInvitation(Username),

    /// The persistence gateway failed. The real cause is in the source
    /// error; clients only see a generic notice.
    #[error("Service unavailable")]
    Persistence(#[from] GatewayError),
}
