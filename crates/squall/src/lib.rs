//! # Squall
//!
//! Host-authoritative session layer for turn-based multiplayer games.
//!
//! One player's process hosts a lobby and owns the authoritative state;
//! everyone else mirrors it from full snapshots. Large round payloads
//! travel as 16 KiB chunks with reassembly on the receiving side, and
//! out-of-lobby players are reachable through presence addresses for
//! invites.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use squall::prelude::*;
//!
//! # async fn demo() -> Result<(), SquallError> {
//! let network = MemoryNetwork::new();
//! let payloads = StaticPayloads::new().with("round-1", vec![0u8; 64 * 1024]);
//!
//! // One process hosts...
//! let host = spawn_host(
//!     &network,
//!     PlayerProfile::new("u-host", "Ana"),
//!     Difficulty::Beginner,
//!     payloads,
//!     HostConfig::default(),
//! )
//! .await?;
//!
//! // ...and the others join by code.
//! let mut guest = join(
//!     &network,
//!     host.code(),
//!     PlayerProfile::new("u-guest", "Bea"),
//!     JoinConfig::default(),
//! )
//! .await
//! .map_err(SquallError::from)?;
//!
//! host.start_round("round-1").await?;
//! while let Some(event) = guest.next_event().await {
//!     if let ClientEvent::PayloadReady { data, .. } = event {
//!         assert_eq!(data.len(), 64 * 1024);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::SquallError;

/// Initializes a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Call once from a binary or a test's setup; repeated calls are no-ops
/// so parallel tests can all invoke it safely.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Everything a typical application needs, one `use` away.
pub mod prelude {
    pub use crate::{SquallError, init_tracing};

    pub use squall_link::{Link, LinkError, Listener, MemoryNetwork, Network, SessionCode};
    #[cfg(feature = "relay")]
    pub use squall_link::{RelayNetwork, RelayServer};

    pub use squall_protocol::{
        ChatMessage, Difficulty, Lobby, LobbyStatus, Message, PayloadKind, Player, PlayerId,
        PlayerProfile,
    };

    pub use squall_chunk::{Assembler, ChunkError};

    pub use squall_lobby::{HostConfig, HostError, HostHandle, PayloadSource, StaticPayloads,
        spawn_host};

    pub use squall_client::{
        ClientEvent, ClientHandle, Invite, InviteError, JoinConfig, JoinError, Presence, join,
        send_invite,
    };
}
