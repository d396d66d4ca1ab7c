//! Client actor: mirrors the host's lobby and reassembles payloads.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Duration, MissedTickBehavior};

use squall_chunk::Assembler;
use squall_link::Link;
use squall_protocol::{
    ChatMessage, Codec, JsonCodec, Lobby, Message, PayloadKind, PlayerId, PlayerProfile,
};

use crate::ClientError;

/// Cadence of the stale-assembly sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Assemblies untouched this long are abandoned transfers.
const ASSEMBLY_TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// What the client surfaces to the application.
#[derive(Debug)]
pub enum ClientEvent {
    /// A fresh snapshot replaced the local lobby copy. Read it through
    /// [`ClientHandle::lobby`].
    LobbyUpdated,

    /// A chunked payload finished reassembling.
    PayloadReady {
        kind: PayloadKind,
        meta: Option<String>,
        data: Vec<u8>,
    },

    /// A chat line relayed by the host (our own lines included).
    Chat(ChatMessage),

    /// The host refused a request after the join completed.
    Rejected { message: String },

    /// The link to the host is gone. The application decides whether to
    /// rejoin (same profile, same code — the host treats it as a rejoin).
    Disconnected,
}

enum ClientCommand {
    SubmitScore { score: u32, distance: f64, streak: u32 },
    ReportProgress { progress: u8 },
    RequestPayload,
    SendChat { text: String },
    ChatLog { reply: oneshot::Sender<Vec<ChatMessage>> },
    Leave,
}

// ---------------------------------------------------------------------------
// ClientHandle
// ---------------------------------------------------------------------------

/// Handle to a joined lobby, returned by [`join`](crate::join).
///
/// Read models are `watch` channels: [`lobby`](Self::lobby) always
/// returns the latest full snapshot, [`download_progress`](Self::download_progress)
/// the latest payload percentage. Discrete happenings arrive through
/// [`next_event`](Self::next_event).
#[derive(Debug)]
pub struct ClientHandle {
    player_id: PlayerId,
    commands: mpsc::Sender<ClientCommand>,
    lobby: watch::Receiver<Lobby>,
    download: watch::Receiver<u8>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl ClientHandle {
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// The latest lobby snapshot.
    pub fn lobby(&self) -> Lobby {
        self.lobby.borrow().clone()
    }

    /// A `watch` subscription to lobby snapshots, for `changed()` loops.
    pub fn lobby_watch(&self) -> watch::Receiver<Lobby> {
        self.lobby.clone()
    }

    /// Payload download progress, 0–100.
    pub fn download_progress(&self) -> u8 {
        *self.download.borrow()
    }

    pub fn progress_watch(&self) -> watch::Receiver<u8> {
        self.download.clone()
    }

    /// The next client event, or `None` once the actor has stopped.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Submits this round's result.
    pub async fn submit_score(
        &self,
        score: u32,
        distance: f64,
        streak: u32,
    ) -> Result<(), ClientError> {
        self.send(ClientCommand::SubmitScore {
            score,
            distance,
            streak,
        })
        .await
    }

    /// Reports payload download progress explicitly. Normally automatic.
    pub async fn report_progress(&self, progress: u8) -> Result<(), ClientError> {
        self.send(ClientCommand::ReportProgress { progress }).await
    }

    /// Asks the host to re-send the current round payload.
    pub async fn request_payload(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::RequestPayload).await
    }

    /// Sends a chat line. It comes back through the host relay as a
    /// [`ClientEvent::Chat`] like everyone else's.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(ClientCommand::SendChat { text: text.into() }).await
    }

    /// The deduplicated chat log seen so far.
    pub async fn chat_log(&self) -> Result<Vec<ChatMessage>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(ClientCommand::ChatLog { reply }).await?;
        rx.await.map_err(|_| ClientError::Unavailable)
    }

    /// Leaves the lobby: tells the host, then closes the link.
    pub async fn leave(self) -> Result<(), ClientError> {
        self.send(ClientCommand::Leave).await
    }

    async fn send(&self, cmd: ClientCommand) -> Result<(), ClientError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ClientError::Unavailable)
    }
}

/// Spawns the client actor around an established, joined link.
pub(crate) fn spawn_client<L: Link>(
    link: L,
    profile: PlayerProfile,
    initial: Lobby,
) -> ClientHandle {
    let player_id = profile.id.clone();
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (lobby_tx, lobby_rx) = watch::channel(initial);
    let (download_tx, download_rx) = watch::channel(0u8);

    let actor = ClientActor {
        link,
        player_id: profile.id,
        display_name: profile.display_name,
        assembler: Assembler::new(),
        chat: Vec::new(),
        chat_seq: 0,
        lobby_tx,
        download_tx,
        events: event_tx,
        commands: cmd_rx,
    };
    tokio::spawn(actor.run());

    ClientHandle {
        player_id,
        commands: cmd_tx,
        lobby: lobby_rx,
        download: download_rx,
        events: event_rx,
    }
}

// ---------------------------------------------------------------------------
// ClientActor
// ---------------------------------------------------------------------------

struct ClientActor<L: Link> {
    link: L,
    player_id: PlayerId,
    display_name: String,
    assembler: Assembler,
    /// Append-only, deduplicated by message id (the host echoes our own
    /// lines back).
    chat: Vec<ChatMessage>,
    chat_seq: u64,
    lobby_tx: watch::Sender<Lobby>,
    download_tx: watch::Sender<u8>,
    events: mpsc::UnboundedSender<ClientEvent>,
    commands: mpsc::Receiver<ClientCommand>,
}

impl<L: Link> ClientActor<L> {
    async fn run(mut self) {
        tracing::debug!(player_id = %self.player_id, "client actor started");

        let mut sweep = time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    // A dropped handle means the application is done
                    // with the lobby: leave cleanly.
                    Some(ClientCommand::Leave) | None => {
                        self.send_to_host(Message::Leave {
                            player_id: self.player_id.clone(),
                        })
                        .await;
                        self.link.close().await;
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                },
                frame = self.link.recv() => match frame {
                    Ok(Some(bytes)) => self.handle_frame(&bytes).await,
                    Ok(None) => {
                        tracing::info!(player_id = %self.player_id, "host link closed");
                        let _ = self.events.send(ClientEvent::Disconnected);
                        break;
                    }
                    Err(err) => {
                        tracing::debug!(player_id = %self.player_id, %err, "link receive failed");
                        let _ = self.events.send(ClientEvent::Disconnected);
                        break;
                    }
                },
                _ = sweep.tick() => {
                    self.assembler.sweep_stale(ASSEMBLY_TTL);
                }
            }
        }

        tracing::debug!(player_id = %self.player_id, "client actor stopped");
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::SubmitScore {
                score,
                distance,
                streak,
            } => {
                self.send_to_host(Message::SubmitScore {
                    player_id: self.player_id.clone(),
                    score,
                    distance,
                    streak,
                })
                .await;
            }
            ClientCommand::ReportProgress { progress } => {
                self.publish_progress(progress.min(100)).await;
            }
            ClientCommand::RequestPayload => {
                self.send_to_host(Message::RequestPayload {
                    player_id: self.player_id.clone(),
                })
                .await;
            }
            ClientCommand::SendChat { text } => {
                self.chat_seq += 1;
                let message = ChatMessage {
                    id: format!("{}-{}", self.player_id, self.chat_seq),
                    sender_id: self.player_id.clone(),
                    sender_name: self.display_name.clone(),
                    text,
                    timestamp: now_millis(),
                };
                self.send_to_host(Message::Chat { message }).await;
            }
            ClientCommand::ChatLog { reply } => {
                let _ = reply.send(self.chat.clone());
            }
            // Handled in the run loop.
            ClientCommand::Leave => {}
        }
    }

    async fn handle_frame(&mut self, bytes: &[u8]) {
        match JsonCodec.decode::<Message>(bytes) {
            Ok(Message::SyncLobby { lobby }) => {
                // Wholesale replacement: applying the same snapshot
                // twice is a no-op by construction.
                self.lobby_tx.send_replace(lobby);
                let _ = self.events.send(ClientEvent::LobbyUpdated);
            }
            Ok(Message::DataChunk {
                kind,
                group_id,
                index,
                total,
                data,
                meta,
            }) => {
                self.handle_chunk(kind, group_id, index, total, data, meta)
                    .await;
            }
            Ok(Message::Chat { message }) => {
                if !self.chat.iter().any(|m| m.id == message.id) {
                    self.chat.push(message.clone());
                    let _ = self.events.send(ClientEvent::Chat(message));
                }
            }
            Ok(Message::Error { message }) => {
                tracing::warn!(player_id = %self.player_id, %message, "host reported an error");
                let _ = self.events.send(ClientEvent::Rejected { message });
            }
            Ok(_) => {
                tracing::warn!(player_id = %self.player_id, "unexpected message on client link, dropped");
            }
            Err(err) => {
                tracing::warn!(player_id = %self.player_id, %err, "undecodable frame dropped");
            }
        }
    }

    async fn handle_chunk(
        &mut self,
        kind: PayloadKind,
        group_id: String,
        index: u32,
        total: u32,
        data: Vec<u8>,
        meta: Option<String>,
    ) {
        match self
            .assembler
            .accept(kind, &group_id, index, total, data, meta)
        {
            Ok(Some(done)) => {
                self.publish_progress(100).await;
                let _ = self.events.send(ClientEvent::PayloadReady {
                    kind: done.kind,
                    meta: done.meta,
                    data: done.data,
                });
            }
            Ok(None) => {
                if let Some(progress) = self.assembler.progress(&group_id) {
                    self.publish_progress(progress).await;
                }
            }
            Err(err) => {
                tracing::warn!(group_id, %err, "malformed chunk dropped");
            }
        }
    }

    /// Updates the progress watch and mirrors the change to the host.
    /// Unchanged values are dropped so the host is not flooded.
    async fn publish_progress(&mut self, progress: u8) {
        if *self.download_tx.borrow() == progress {
            return;
        }
        self.download_tx.send_replace(progress);
        self.send_to_host(Message::ReportProgress {
            player_id: self.player_id.clone(),
            progress,
        })
        .await;
    }

    /// Encode failures and a dead link are both logged no-ops: the recv
    /// side of the loop is where disconnection is detected.
    async fn send_to_host(&self, msg: Message) {
        let bytes = match JsonCodec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "outbound encode failed, dropping");
                return;
            }
        };
        if let Err(err) = self.link.send(&bytes).await {
            tracing::debug!(%err, "send to host failed");
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
