//! In-process link fabric: code-addressed pairing over channels.
//!
//! Every link is a pair of unbounded byte channels, so ordering and
//! reliability match the real transport's guarantees exactly. This is
//! the implementation the deterministic test suites run against.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Link, LinkError, LinkId, Listener, Network, SessionCode};

/// Counter for generating unique link IDs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// An in-process [`Network`]: codes are bound in a shared registry and
/// dialing pairs two channel endpoints.
///
/// Clones share the registry — create one per simulated fabric.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    codes: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<MemoryLink>>>>,
}

impl MemoryNetwork {
    /// Creates an empty fabric.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Network for MemoryNetwork {
    type Link = MemoryLink;
    type Listener = MemoryListener;

    async fn listen(&self, code: &SessionCode) -> Result<Self::Listener, LinkError> {
        let mut codes = self.codes.lock().await;

        // A dead listener leaves a closed sender behind; rebinding over
        // it is allowed.
        if let Some(existing) = codes.get(code.as_str()) {
            if !existing.is_closed() {
                return Err(LinkError::UnavailableCode(code.clone()));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        codes.insert(code.as_str().to_string(), tx);
        tracing::debug!(%code, "memory network bound code");

        Ok(MemoryListener { incoming: rx })
    }

    async fn connect(&self, code: &SessionCode) -> Result<Self::Link, LinkError> {
        let codes = self.codes.lock().await;
        let queue = codes
            .get(code.as_str())
            .filter(|tx| !tx.is_closed())
            .ok_or_else(|| LinkError::UnknownCode(code.clone()))?;

        let (local, remote) = MemoryLink::pair();
        queue
            .send(remote)
            .map_err(|_| LinkError::UnknownCode(code.clone()))?;

        tracing::debug!(%code, id = %local.id(), "memory network dialed code");
        Ok(local)
    }
}

/// Listener half of a bound code on a [`MemoryNetwork`].
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<MemoryLink>,
}

impl Listener for MemoryListener {
    type Link = MemoryLink;

    async fn accept(&mut self) -> Option<MemoryLink> {
        self.incoming.recv().await
    }
}

struct MemoryLinkShared {
    /// Outbound half. Taken on close so sends fail fast afterwards.
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

/// One endpoint of an in-process link.
#[derive(Clone)]
pub struct MemoryLink {
    id: LinkId,
    inner: Arc<MemoryLinkShared>,
}

impl MemoryLink {
    /// Creates a connected pair of endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::from_halves(a_tx, b_rx), Self::from_halves(b_tx, a_rx))
    }

    fn from_halves(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            id: LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)),
            inner: Arc::new(MemoryLinkShared {
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(rx),
            }),
        }
    }
}

impl Link for MemoryLink {
    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        let tx = self.inner.tx.lock().await;
        match tx.as_ref() {
            Some(tx) => tx.send(data.to_vec()).map_err(|_| LinkError::Closed),
            None => Err(LinkError::Closed),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, LinkError> {
        Ok(self.inner.rx.lock().await.recv().await)
    }

    async fn close(&self) {
        // Dropping the sender lets the peer observe the close. The
        // receiver is closed best-effort: a clone parked in recv() holds
        // the lock, and it will observe the close through the peer's
        // reaction instead.
        self.inner.tx.lock().await.take();
        if let Ok(mut rx) = self.inner.rx.try_lock() {
            rx.close();
        }
    }

    fn id(&self) -> LinkId {
        self.id
    }
}
