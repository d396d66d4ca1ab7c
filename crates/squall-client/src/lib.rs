//! Guest-side session layer.
//!
//! Three pieces:
//!
//! - [`join`] — the connect/retry controller. Dials a session code,
//!   performs the join handshake, and retries transient failures with
//!   linear backoff. Resolves to a [`ClientHandle`] or a [`JoinError`];
//!   it never hangs.
//! - [`ClientHandle`] / client actor — owns the single link to the host,
//!   mirrors [`Lobby`] snapshots into a `watch` channel, reassembles
//!   payload chunks, and reports download progress back to the host.
//! - [`Presence`] — a long-lived listener on an identity-derived address
//!   through which other players deliver lobby invites.
//!
//! [`Lobby`]: squall_protocol::Lobby

mod client;
mod error;
mod join;
mod presence;

pub use client::{ClientEvent, ClientHandle};
pub use error::{ClientError, InviteError, JoinError};
pub use join::{JoinConfig, join};
pub use presence::{Invite, Presence, send_invite};
