//! Error types for the link layer.

use crate::SessionCode;

/// Errors that can occur while establishing or using a link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The session code is already bound elsewhere.
    /// The caller should regenerate the code and retry.
    #[error("session code {0} is already bound")]
    UnavailableCode(SessionCode),

    /// Nothing is bound to the dialed session code.
    #[error("no peer bound to session code {0}")]
    UnknownCode(SessionCode),

    /// The link is closed; the peer is gone.
    #[error("link closed")]
    Closed,

    /// No viable path could be formed, or I/O on an established path
    /// failed. Covers relay exhaustion.
    #[error("transport failure: {0}")]
    Transport(#[source] std::io::Error),

    /// The rendezvous handshake produced an unexpected reply.
    #[error("rendezvous handshake failed: {0}")]
    Handshake(String),
}
