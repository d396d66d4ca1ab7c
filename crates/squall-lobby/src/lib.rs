//! Host-side lobby replication engine.
//!
//! One [`HostActor`] task per lobby, owning the [`Lobby`] aggregate
//! exclusively. Everything else — handle calls, link traffic, timers —
//! arrives as events on the actor's channels; there is no shared mutable
//! state.
//!
//! Replication is deliberately crude: after every mutation the host
//! broadcasts a full [`SyncLobby`] snapshot and clients replace their
//! copy wholesale. Full snapshots are small (tens of players at most)
//! and make the protocol self-healing — one lost update is repaired by
//! the next broadcast or by the waiting-phase heartbeat.
//!
//! [`HostActor`]: crate::host::HostHandle
//! [`Lobby`]: squall_protocol::Lobby
//! [`SyncLobby`]: squall_protocol::Message::SyncLobby

mod config;
mod error;
mod host;
mod source;

pub use config::HostConfig;
pub use error::HostError;
pub use host::{HostHandle, spawn_host};
pub use source::{PayloadSource, StaticPayloads};
