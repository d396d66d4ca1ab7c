//! WebSocket rendezvous relay: the path of last resort between peers.
//!
//! Both sides dial the relay. A host **binds** a session code on a
//! control connection; each client **dials** the code. The relay hands
//! the host a one-time ticket, the host **accepts** it on a fresh
//! connection, and the relay splices the two byte streams together.
//!
//! ```text
//! host ── BIND code ──────► relay ◄────── DIAL code ── client
//!      ◄─ INCOMING ticket ─      (waits)
//!      ── ACCEPT ticket ──►      splice ─────────────►
//! ```
//!
//! Handshake frames are single text messages; everything after the
//! handshake is forwarded verbatim.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::{Link, LinkError, LinkId, Listener, Network, SessionCode};

/// Counter for generating unique link IDs (shared with other transports
/// would be nicer, but per-module counters keep the crates decoupled).
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1 << 32);

/// How long the rendezvous handshake may take before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type ServerWs = tokio_tungstenite::WebSocketStream<TcpStream>;
type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<TcpStream>,
>;

fn io_error(kind: std::io::ErrorKind, e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> LinkError {
    LinkError::Transport(std::io::Error::new(kind, e))
}

// ---------------------------------------------------------------------------
// Relay server
// ---------------------------------------------------------------------------

struct RelayState {
    /// Bound codes → ticket queue feeding the host's control connection.
    bound: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
    /// Outstanding tickets → the dialer waiting for the host to accept.
    pending: Mutex<HashMap<String, oneshot::Sender<ServerWs>>>,
    next_ticket: AtomicU64,
}

/// The rendezvous/relay server. One instance serves any number of
/// sessions; it holds no game state, only pairing bookkeeping.
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Binds the relay to the given TCP address.
    pub async fn bind(addr: &str) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(LinkError::Transport)?;
        tracing::info!(addr, "relay server listening");
        Ok(Self {
            listener,
            state: Arc::new(RelayState {
                bound: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
            }),
        })
    }

    /// Returns the local address the relay is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop. Each connection gets its own task; a
    /// misbehaving peer never affects the loop.
    pub async fn run(self) -> Result<(), LinkError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_relay_conn(stream, state).await {
                            tracing::debug!(%addr, error = %e, "relay connection ended");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "relay accept failed");
                }
            }
        }
    }
}

async fn handle_relay_conn(
    stream: TcpStream,
    state: Arc<RelayState>,
) -> Result<(), LinkError> {
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| io_error(std::io::ErrorKind::ConnectionRefused, e))?;

    let hello = read_text(&mut ws).await?;
    let (verb, arg) = hello
        .split_once(' ')
        .ok_or_else(|| LinkError::Handshake(format!("malformed hello: {hello}")))?;

    match verb {
        "BIND" => handle_bind(ws, arg, state).await,
        "DIAL" => handle_dial(ws, arg, state).await,
        "ACCEPT" => handle_accept(ws, arg, state).await,
        _ => {
            let _ = ws.send(Message::Text("ERR bad-verb".into())).await;
            Err(LinkError::Handshake(format!("unknown verb: {verb}")))
        }
    }
}

/// Host control connection: registers the code and streams tickets back.
async fn handle_bind(
    mut ws: ServerWs,
    code: &str,
    state: Arc<RelayState>,
) -> Result<(), LinkError> {
    let (tx, mut tickets) = mpsc::unbounded_channel();
    {
        let mut bound = state.bound.lock().await;
        if bound.get(code).is_some_and(|t| !t.is_closed()) {
            let _ = ws.send(Message::Text("ERR code-unavailable".into())).await;
            return Err(LinkError::UnavailableCode(SessionCode::new(code)));
        }
        bound.insert(code.to_string(), tx);
    }
    ws.send(Message::Text("OK".into()))
        .await
        .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;
    tracing::info!(code, "relay bound code");

    // Forward tickets until the host drops the control connection.
    loop {
        tokio::select! {
            ticket = tickets.recv() => {
                let Some(ticket) = ticket else { break };
                ws.send(Message::Text(format!("INCOMING {ticket}").into()))
                    .await
                    .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        }
    }

    state.bound.lock().await.remove(code);
    tracing::info!(code, "relay released code");
    Ok(())
}

/// Dialer connection: parks until the host accepts, then splices.
async fn handle_dial(
    mut ws: ServerWs,
    code: &str,
    state: Arc<RelayState>,
) -> Result<(), LinkError> {
    let ticket = format!(
        "T{}",
        state.next_ticket.fetch_add(1, Ordering::Relaxed)
    );

    let (host_tx, host_rx) = oneshot::channel();
    let notified = {
        let bound = state.bound.lock().await;
        match bound.get(code) {
            Some(queue) if !queue.is_closed() => {
                state
                    .pending
                    .lock()
                    .await
                    .insert(ticket.clone(), host_tx);
                queue.send(ticket.clone()).is_ok()
            }
            _ => false,
        }
    };
    if !notified {
        let _ = ws.send(Message::Text("ERR unknown-code".into())).await;
        return Err(LinkError::UnknownCode(SessionCode::new(code)));
    }

    let host_ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, host_rx).await {
        Ok(Ok(host_ws)) => host_ws,
        _ => {
            state.pending.lock().await.remove(&ticket);
            let _ = ws.send(Message::Text("ERR no-peer".into())).await;
            return Err(LinkError::Handshake("host did not accept".into()));
        }
    };

    let mut host_ws = host_ws;
    host_ws
        .send(Message::Text("OK".into()))
        .await
        .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;
    ws.send(Message::Text("OK".into()))
        .await
        .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;

    tracing::debug!(code, ticket, "relay spliced link");
    splice(ws, host_ws).await;
    Ok(())
}

/// Host data connection answering a ticket: hand the stream to the
/// waiting dialer task.
async fn handle_accept(
    mut ws: ServerWs,
    ticket: &str,
    state: Arc<RelayState>,
) -> Result<(), LinkError> {
    let waiter = state.pending.lock().await.remove(ticket);
    match waiter {
        Some(waiter) => {
            // If the dialer gave up, the stream just drops.
            let _ = waiter.send(ws);
            Ok(())
        }
        None => {
            let _ = ws.send(Message::Text("ERR unknown-ticket".into())).await;
            Err(LinkError::Handshake(format!("unknown ticket: {ticket}")))
        }
    }
}

/// Forwards data frames in both directions until either side closes.
async fn splice(mut a: ServerWs, mut b: ServerWs) {
    loop {
        tokio::select! {
            msg = a.next() => {
                if !forward(msg, &mut b).await {
                    break;
                }
            }
            msg = b.next() => {
                if !forward(msg, &mut a).await {
                    break;
                }
            }
        }
    }
    let _ = a.close(None).await;
    let _ = b.close(None).await;
}

/// Forwards one frame; returns `false` when the splice should end.
async fn forward(
    msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    to: &mut ServerWs,
) -> bool {
    match msg {
        Some(Ok(m @ (Message::Binary(_) | Message::Text(_)))) => {
            to.send(m).await.is_ok()
        }
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => false,
        Some(Ok(_)) => true, // ping/pong/frame
    }
}

// ---------------------------------------------------------------------------
// Relay-backed Network
// ---------------------------------------------------------------------------

/// A [`Network`] whose rendezvous and data path both go through a
/// [`RelayServer`].
#[derive(Clone)]
pub struct RelayNetwork {
    url: String,
}

impl RelayNetwork {
    /// Creates a network that rendezvouses through the relay at `url`
    /// (e.g. `ws://127.0.0.1:9400`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn dial_relay(&self) -> Result<ClientWs, LinkError> {
        let (ws, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| io_error(std::io::ErrorKind::ConnectionRefused, e))?;
        Ok(ws)
    }
}

impl Network for RelayNetwork {
    type Link = WsLink;
    type Listener = RelayListener;

    async fn listen(&self, code: &SessionCode) -> Result<Self::Listener, LinkError> {
        let mut control = self.dial_relay().await?;
        control
            .send(Message::Text(format!("BIND {code}").into()))
            .await
            .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;

        match read_text_timeout(&mut control).await?.as_str() {
            "OK" => Ok(RelayListener {
                control,
                network: self.clone(),
            }),
            "ERR code-unavailable" => {
                Err(LinkError::UnavailableCode(code.clone()))
            }
            other => Err(LinkError::Handshake(other.to_string())),
        }
    }

    async fn connect(&self, code: &SessionCode) -> Result<Self::Link, LinkError> {
        let mut ws = self.dial_relay().await?;
        ws.send(Message::Text(format!("DIAL {code}").into()))
            .await
            .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;

        match read_text_timeout(&mut ws).await?.as_str() {
            "OK" => Ok(WsLink::new(ws)),
            "ERR unknown-code" => Err(LinkError::UnknownCode(code.clone())),
            other => Err(LinkError::Handshake(other.to_string())),
        }
    }
}

/// Listener half of a relay-bound code: tickets arrive on the control
/// connection, each one is answered with a fresh data connection.
pub struct RelayListener {
    control: ClientWs,
    network: RelayNetwork,
}

impl Listener for RelayListener {
    type Link = WsLink;

    async fn accept(&mut self) -> Option<WsLink> {
        loop {
            let ticket = match self.control.next().await {
                Some(Ok(Message::Text(t))) => {
                    match t.as_str().strip_prefix("INCOMING ") {
                        Some(ticket) => ticket.to_string(),
                        None => {
                            tracing::warn!(frame = %t, "unexpected control frame");
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            };

            match self.answer(&ticket).await {
                Ok(link) => return Some(link),
                Err(e) => {
                    // One failed dialer must not stop the listener.
                    tracing::warn!(ticket, error = %e, "failed to accept link");
                }
            }
        }
    }
}

impl RelayListener {
    async fn answer(&self, ticket: &str) -> Result<WsLink, LinkError> {
        let mut ws = self.network.dial_relay().await?;
        ws.send(Message::Text(format!("ACCEPT {ticket}").into()))
            .await
            .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))?;
        match read_text_timeout(&mut ws).await?.as_str() {
            "OK" => Ok(WsLink::new(ws)),
            other => Err(LinkError::Handshake(other.to_string())),
        }
    }
}

/// A spliced WebSocket link.
///
/// Sink and stream halves are locked separately, so a clone parked in
/// `recv()` never blocks another clone's `send()` or `close()`.
#[derive(Clone)]
pub struct WsLink {
    id: LinkId,
    tx: Arc<Mutex<SplitSink<ClientWs, Message>>>,
    rx: Arc<Mutex<SplitStream<ClientWs>>>,
}

impl WsLink {
    fn new(ws: ClientWs) -> Self {
        let (tx, rx) = ws.split();
        Self {
            id: LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)),
            tx: Arc::new(Mutex::new(tx)),
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl Link for WsLink {
    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        self.tx
            .lock()
            .await
            .send(Message::Binary(data.to_vec().into()))
            .await
            .map_err(|e| io_error(std::io::ErrorKind::BrokenPipe, e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, LinkError> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(_)) => return Ok(None),
            }
        }
    }

    async fn close(&self) {
        let _ = self.tx.lock().await.close().await;
    }

    fn id(&self) -> LinkId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Handshake frame helpers
// ---------------------------------------------------------------------------

async fn read_text(ws: &mut ServerWs) -> Result<String, LinkError> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, ws.next()).await {
        Ok(Some(Ok(Message::Text(t)))) => Ok(t.as_str().to_string()),
        Ok(Some(Ok(_))) => {
            Err(LinkError::Handshake("expected text frame".into()))
        }
        Ok(Some(Err(e))) => Err(io_error(std::io::ErrorKind::ConnectionReset, e)),
        Ok(None) => Err(LinkError::Closed),
        Err(_) => Err(LinkError::Handshake("handshake timed out".into())),
    }
}

async fn read_text_timeout(ws: &mut ClientWs) -> Result<String, LinkError> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, ws.next()).await {
        Ok(Some(Ok(Message::Text(t)))) => Ok(t.as_str().to_string()),
        Ok(Some(Ok(_))) => {
            Err(LinkError::Handshake("expected text frame".into()))
        }
        Ok(Some(Err(e))) => Err(io_error(std::io::ErrorKind::ConnectionReset, e)),
        Ok(None) => Err(LinkError::Closed),
        Err(_) => Err(LinkError::Handshake("handshake timed out".into())),
    }
}
