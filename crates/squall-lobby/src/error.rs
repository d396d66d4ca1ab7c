//! Error types for the host engine.

use squall_link::LinkError;
use squall_protocol::LobbyStatus;

/// Errors surfaced by the host engine.
///
/// These reach the *host application* through [`HostHandle`] calls.
/// Errors caused by remote clients (malformed messages, out-of-state
/// requests) are never in here — the actor absorbs those as logged
/// no-ops so the event loop cannot be killed from the wire.
///
/// [`HostHandle`]: crate::HostHandle
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The underlying link layer failed while setting the lobby up.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Every generated session code was already bound.
    #[error("could not bind a session code after {attempts} attempts")]
    CodeExhausted { attempts: u32 },

    /// The requested operation is not legal in the current state, e.g.
    /// `start_round` while already `playing`.
    #[error("illegal transition from {from} to {to}")]
    InvalidTransition { from: LobbyStatus, to: LobbyStatus },

    /// The payload source had nothing for the requested round. The
    /// lobby state is unchanged; the caller may retry with another id.
    #[error("no payload available for round {round_id}")]
    PayloadUnavailable { round_id: String },

    /// The actor task is gone (shut down or panicked).
    #[error("lobby is no longer running")]
    Unavailable,
}
