//! Wire protocol for Squall.
//!
//! This crate defines the "language" that the host and its clients speak:
//!
//! - **Messages** ([`Message`]) — the closed set of variants that travel
//!   on a link. Flat, serializable records with no behavior.
//! - **Replicated model** ([`Lobby`], [`Player`]) — the aggregate the
//!   host owns and clients replace wholesale from snapshots.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! The codec validates structural shape only. Semantic validation
//! ("is this lobby full") belongs to the replication engine.

mod codec;
mod error;
mod lobby;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use lobby::{Lobby, LobbyStatus, MAX_PLAYERS, Player};
pub use types::{
    ChatMessage, Difficulty, Message, PayloadKind, PlayerId, PlayerProfile,
    DISTANCE_SENTINEL,
};
