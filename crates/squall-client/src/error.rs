//! Error types for the guest side.

use squall_link::LinkError;
use squall_protocol::{PlayerId, ProtocolError};

/// Why a join resolved unsuccessfully.
///
/// Transient failures (no path, link dropped mid-handshake, handshake
/// timeout) are retried internally and only surface here once the
/// attempt budget is spent. A host rejection is terminal immediately —
/// a full lobby does not get emptier by redialing it.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// The host refused the join (e.g. the lobby is full).
    #[error("join rejected by host: {message}")]
    Rejected { message: String },

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} join attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// Errors from [`ClientHandle`](crate::ClientHandle) calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client actor is gone (left, disconnected, or shut down).
    #[error("client is no longer running")]
    Unavailable,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Errors from [`send_invite`](crate::send_invite).
///
/// Deliberately coarse: whatever went wrong underneath, the caller can
/// only tell the user "could not reach player".
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// The target has no presence registered, or the link failed before
    /// the invite was delivered.
    #[error("could not reach player {target}")]
    Unreachable { target: PlayerId },
}
