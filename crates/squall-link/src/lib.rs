//! Peer link layer for Squall.
//!
//! A **link** is a full-duplex, ordered, reliable byte channel between two
//! participants' processes. Links are established through a rendezvous key
//! (a [`SessionCode`]): the host side [`listen`](Network::listen)s on a
//! code, clients [`connect`](Network::connect) to it.
//!
//! Two implementations are provided:
//!
//! - [`MemoryNetwork`] — in-process pairing through channels. Used by the
//!   test suites and by single-process demos.
//! - [`RelayNetwork`] / [`RelayServer`] (feature `relay`, default) — a
//!   WebSocket rendezvous server that pairs a bound code with each dialer
//!   and splices the two byte streams. This is the fallback path when no
//!   direct route between peers exists.
//!
//! Ordering: messages sent on one link arrive in send order. There is no
//! ordering guarantee across different links — higher layers are designed
//! to be order-tolerant.

mod code;
mod error;
mod memory;
#[cfg(feature = "relay")]
mod relay;

pub use code::SessionCode;
pub use error::LinkError;
pub use memory::{MemoryLink, MemoryListener, MemoryNetwork};
#[cfg(feature = "relay")]
pub use relay::{RelayListener, RelayNetwork, RelayServer, WsLink};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a link, unique within the process.
///
/// Fresh per connection attempt, so a retried attempt can never be
/// confused with the stale link it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    /// Creates a `LinkId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// A rendezvous endpoint that can bind and dial session codes.
///
/// Cloning a `Network` yields another handle to the same underlying
/// fabric (registry or relay address) — it is cheap and expected.
///
/// The methods are written in desugared form with an explicit `Send`
/// bound on the returned futures: the engines `tokio::spawn` tasks that
/// are generic over these traits.
pub trait Network: Clone + Send + Sync + 'static {
    /// The link type produced by this network.
    type Link: Link;
    /// The listener type returned by [`listen`](Self::listen).
    type Listener: Listener<Link = Self::Link>;

    /// Binds `code` and returns a listener for incoming links.
    ///
    /// # Errors
    /// [`LinkError::UnavailableCode`] if the code is already bound
    /// elsewhere — the caller should regenerate the code and retry.
    fn listen(
        &self,
        code: &SessionCode,
    ) -> impl Future<Output = Result<Self::Listener, LinkError>> + Send;

    /// Dials the peer bound to `code`.
    ///
    /// # Errors
    /// [`LinkError::UnknownCode`] if nothing is bound to the code, or
    /// [`LinkError::Transport`] when no viable path could be formed.
    fn connect(
        &self,
        code: &SessionCode,
    ) -> impl Future<Output = Result<Self::Link, LinkError>> + Send;
}

/// Accepts incoming links on a bound session code.
///
/// Dropping the listener releases the code.
pub trait Listener: Send + 'static {
    /// The link type this listener yields.
    type Link: Link;

    /// Waits for the next incoming link.
    ///
    /// Returns `None` when the binding is gone for good (network shut
    /// down, relay control connection lost).
    fn accept(&mut self) -> impl Future<Output = Option<Self::Link>> + Send;
}

/// One established, bidirectional, ordered byte channel.
///
/// Clones share the same underlying channel, so one handle can feed a
/// writer task while another feeds a reader task. Closing either end
/// terminates the link; the remote side observes this as `recv()`
/// returning `Ok(None)` — that is the only failure signal after
/// establishment.
pub trait Link: Clone + Send + Sync + 'static {
    /// Sends one message to the peer. Fire-and-forget: delivery is not
    /// guaranteed beyond the channel's own reliability.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Receives the next message. `Ok(None)` means the link closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, LinkError>> + Send;

    /// Closes the link. Immediate and unilateral.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Returns this link's unique identifier.
    fn id(&self) -> LinkId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_new_and_into_inner() {
        let id = LinkId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_link_id_display() {
        assert_eq!(LinkId::new(7).to_string(), "link-7");
    }

    #[test]
    fn test_link_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(LinkId::new(1), "host");
        map.insert(LinkId::new(2), "client");
        assert_eq!(map[&LinkId::new(1)], "host");
    }
}
