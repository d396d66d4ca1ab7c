//! Host actor: an isolated tokio task that owns one lobby.
//!
//! The actor communicates with the outside world through channels only:
//! a command channel from the [`HostHandle`], and an event channel fed
//! by the accept loop and the per-link reader tasks. Outbound traffic
//! goes through an unbounded queue per link so a paced chunk broadcast
//! never blocks the actor loop.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use squall_chunk::{send_paced, split};
use squall_link::{Link, LinkError, LinkId, Listener, Network, SessionCode};
use squall_protocol::{
    ChatMessage, Codec, DISTANCE_SENTINEL, Difficulty, JsonCodec, Lobby, LobbyStatus, Message,
    PayloadKind, PlayerId, PlayerProfile,
};

use crate::{HostConfig, HostError, PayloadSource};

/// How long a rejected joiner gets to read the `Error` reply before the
/// host closes the link under it.
const REJECT_GRACE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Commands sent to the host actor through its channel. Variants with a
/// `oneshot::Sender` are request/reply; the rest are fire-and-forget.
enum HostCommand {
    StartRound {
        round_id: String,
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    ForceStart {
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    ForceEndRound {
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    EndMatch {
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    /// The host player's own submission; guests submit over their link.
    SubmitScore { score: u32, distance: f64, streak: u32 },
    SendChat { text: String },
    Snapshot {
        reply: oneshot::Sender<Lobby>,
    },
    ChatLog {
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
    Shutdown,
}

/// Events from the accept loop and the per-link reader tasks.
enum LinkEvent<L> {
    Opened {
        link: L,
        outbound: mpsc::UnboundedSender<Message>,
    },
    Inbound {
        link_id: LinkId,
        msg: Message,
    },
    Closed {
        link_id: LinkId,
    },
}

// ---------------------------------------------------------------------------
// HostHandle
// ---------------------------------------------------------------------------

/// Handle to a running lobby. Cheap to clone; every method is a message
/// to the actor task.
#[derive(Clone)]
pub struct HostHandle {
    code: SessionCode,
    host_id: PlayerId,
    sender: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    /// The session code guests join with.
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// The hosting player's identity.
    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    /// Starts the first round: fetches the payload, enters `loading`,
    /// and broadcasts the payload to every connected guest.
    pub async fn start_round(&self, round_id: impl Into<String>) -> Result<(), HostError> {
        self.round_command(round_id.into()).await
    }

    /// Starts a subsequent round from `round_results`. Same effect as
    /// [`start_round`](Self::start_round).
    pub async fn next_round(&self, round_id: impl Into<String>) -> Result<(), HostError> {
        self.round_command(round_id.into()).await
    }

    async fn round_command(&self, round_id: String) -> Result<(), HostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(HostCommand::StartRound { round_id, reply })
            .await
            .map_err(|_| HostError::Unavailable)?;
        rx.await.map_err(|_| HostError::Unavailable)?
    }

    /// Skips the rest of the loading phase (dwell floor included) and
    /// begins play immediately.
    pub async fn force_start(&self) -> Result<(), HostError> {
        self.request(|reply| HostCommand::ForceStart { reply }).await
    }

    /// Ends the round now. Players who never submitted are recorded with
    /// score 0 and the sentinel distance.
    pub async fn force_end_round(&self) -> Result<(), HostError> {
        self.request(|reply| HostCommand::ForceEndRound { reply })
            .await
    }

    /// Ends the match from `round_results`. Terminal.
    pub async fn end_match(&self) -> Result<(), HostError> {
        self.request(|reply| HostCommand::EndMatch { reply }).await
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), HostError>>) -> HostCommand,
    ) -> Result<(), HostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| HostError::Unavailable)?;
        rx.await.map_err(|_| HostError::Unavailable)?
    }

    /// Submits the host player's own round result.
    pub async fn submit_score(
        &self,
        score: u32,
        distance: f64,
        streak: u32,
    ) -> Result<(), HostError> {
        self.sender
            .send(HostCommand::SubmitScore {
                score,
                distance,
                streak,
            })
            .await
            .map_err(|_| HostError::Unavailable)
    }

    /// Sends a chat line as the host player.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), HostError> {
        self.sender
            .send(HostCommand::SendChat { text: text.into() })
            .await
            .map_err(|_| HostError::Unavailable)
    }

    /// Returns a copy of the current lobby state.
    pub async fn snapshot(&self) -> Result<Lobby, HostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(HostCommand::Snapshot { reply })
            .await
            .map_err(|_| HostError::Unavailable)?;
        rx.await.map_err(|_| HostError::Unavailable)
    }

    /// Returns the host's chat log.
    pub async fn chat_log(&self) -> Result<Vec<ChatMessage>, HostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(HostCommand::ChatLog { reply })
            .await
            .map_err(|_| HostError::Unavailable)?;
        rx.await.map_err(|_| HostError::Unavailable)
    }

    /// Shuts the lobby down, closing every link.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        self.sender
            .send(HostCommand::Shutdown)
            .await
            .map_err(|_| HostError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// spawn_host
// ---------------------------------------------------------------------------

/// Creates a lobby and spawns its actor.
///
/// Generates a session code and binds it, regenerating on
/// [`LinkError::UnavailableCode`] up to `config.code_retries` times.
/// The hosting player is installed as the first member with
/// `load_progress = 100` (the host holds the payload by definition).
pub async fn spawn_host<N, S>(
    network: &N,
    profile: PlayerProfile,
    difficulty: Difficulty,
    source: S,
    config: HostConfig,
) -> Result<HostHandle, HostError>
where
    N: Network,
    S: PayloadSource,
{
    let mut bound = None;
    for attempt in 0..config.code_retries {
        let code = SessionCode::generate();
        match network.listen(&code).await {
            Ok(listener) => {
                bound = Some((code, listener));
                break;
            }
            Err(LinkError::UnavailableCode(_)) => {
                tracing::debug!(%code, attempt, "session code taken, regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    }
    let Some((code, listener)) = bound else {
        return Err(HostError::CodeExhausted {
            attempts: config.code_retries,
        });
    };

    let lobby = Lobby::new(code.as_str(), profile, difficulty, now_millis());
    let host_id = lobby.host_id.clone();

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(accept_loop(listener, event_tx));

    let actor = HostActor {
        lobby,
        config,
        source,
        links: HashMap::new(),
        by_player: HashMap::new(),
        chat: Vec::new(),
        payload: None,
        loading_since: None,
        debounce_at: None,
        deadline_at: None,
        commands: cmd_rx,
        events: event_rx,
    };
    tokio::spawn(actor.run());

    Ok(HostHandle {
        code,
        host_id,
        sender: cmd_tx,
    })
}

// ---------------------------------------------------------------------------
// Link plumbing tasks
// ---------------------------------------------------------------------------

/// Accepts incoming links and wires each one up with a reader task and
/// a writer task before announcing it to the actor.
async fn accept_loop<Li: Listener>(
    mut listener: Li,
    events: mpsc::UnboundedSender<LinkEvent<Li::Link>>,
) {
    while let Some(link) = listener.accept().await {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(link.clone(), out_rx));
        tokio::spawn(reader_loop(link.clone(), events.clone()));
        if events
            .send(LinkEvent::Opened {
                link,
                outbound: out_tx,
            })
            .is_err()
        {
            break;
        }
    }
}

/// Decodes inbound frames into actor events until the link closes.
/// Undecodable frames are dropped without touching the link.
async fn reader_loop<L: Link>(link: L, events: mpsc::UnboundedSender<LinkEvent<L>>) {
    let codec = JsonCodec;
    let link_id = link.id();
    loop {
        match link.recv().await {
            Ok(Some(bytes)) => match codec.decode::<Message>(&bytes) {
                Ok(msg) => {
                    if events.send(LinkEvent::Inbound { link_id, msg }).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(%link_id, %err, "undecodable frame dropped");
                }
            },
            Ok(None) => {
                let _ = events.send(LinkEvent::Closed { link_id });
                break;
            }
            Err(err) => {
                tracing::debug!(%link_id, %err, "link receive failed");
                let _ = events.send(LinkEvent::Closed { link_id });
                break;
            }
        }
    }
}

/// Drains one link's outbound queue onto the wire.
async fn writer_loop<L: Link>(link: L, mut outbound: mpsc::UnboundedReceiver<Message>) {
    let codec = JsonCodec;
    while let Some(msg) = outbound.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "outbound encode failed, dropping");
                continue;
            }
        };
        if link.send(&bytes).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// HostActor
// ---------------------------------------------------------------------------

struct LinkEntry<L> {
    link: L,
    outbound: mpsc::UnboundedSender<Message>,
}

struct CachedPayload {
    kind: PayloadKind,
    data: Vec<u8>,
    meta: Option<String>,
}

struct HostActor<L: Link, S: PayloadSource> {
    lobby: Lobby,
    config: HostConfig,
    source: S,
    links: HashMap<LinkId, LinkEntry<L>>,
    /// Which link currently speaks for which player. Rebuilt on rejoin.
    by_player: HashMap<PlayerId, LinkId>,
    chat: Vec<ChatMessage>,
    /// The current round's payload, kept for late joiners and re-sends.
    payload: Option<CachedPayload>,
    loading_since: Option<Instant>,
    debounce_at: Option<Instant>,
    deadline_at: Option<Instant>,
    commands: mpsc::Receiver<HostCommand>,
    events: mpsc::UnboundedReceiver<LinkEvent<L>>,
}

/// Sleeps until `at`, or forever when unarmed. Used as `select!` arms
/// for the debounce and deadline timers.
async fn timer(at: Option<Instant>) {
    match at {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<L: Link, S: PayloadSource> HostActor<L, S> {
    async fn run(mut self) {
        tracing::info!(code = %self.lobby.code, "lobby started");

        let mut heartbeat = time::interval(self.config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut loading_poll = time::interval(self.config.loading_poll);
        loading_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(HostCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = self.events.recv() => self.handle_link_event(event),
                _ = heartbeat.tick() => {
                    if self.lobby.status == LobbyStatus::Waiting {
                        self.broadcast_snapshot();
                    }
                }
                _ = loading_poll.tick() => self.poll_loading(),
                _ = timer(self.debounce_at) => self.finish_round(false),
                _ = timer(self.deadline_at) => self.finish_round(true),
            }
        }

        for entry in self.links.values() {
            entry.link.close().await;
        }
        tracing::info!(code = %self.lobby.code, "lobby stopped");
    }

    async fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::StartRound { round_id, reply } => {
                let result = self.begin_round(round_id).await;
                let _ = reply.send(result);
            }
            HostCommand::ForceStart { reply } => {
                let _ = reply.send(self.begin_play(true));
            }
            HostCommand::ForceEndRound { reply } => {
                let result = if self.lobby.status == LobbyStatus::Playing {
                    self.finish_round(true);
                    Ok(())
                } else {
                    Err(HostError::InvalidTransition {
                        from: self.lobby.status,
                        to: LobbyStatus::RoundResults,
                    })
                };
                let _ = reply.send(result);
            }
            HostCommand::EndMatch { reply } => {
                let _ = reply.send(self.end_match());
            }
            HostCommand::SubmitScore {
                score,
                distance,
                streak,
            } => {
                let host_id = self.lobby.host_id.clone();
                self.apply_submit(&host_id, score, distance, streak);
            }
            HostCommand::SendChat { text } => {
                let message = self.compose_host_chat(text);
                self.handle_chat(message);
            }
            HostCommand::Snapshot { reply } => {
                let _ = reply.send(self.lobby.clone());
            }
            HostCommand::ChatLog { reply } => {
                let _ = reply.send(self.chat.clone());
            }
            // Handled in the run loop.
            HostCommand::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------

    async fn begin_round(&mut self, round_id: String) -> Result<(), HostError> {
        let from = self.lobby.status;
        if !from.can_transition_to(LobbyStatus::Loading) {
            return Err(HostError::InvalidTransition {
                from,
                to: LobbyStatus::Loading,
            });
        }

        // Fetch before mutating anything: a missing payload leaves the
        // lobby exactly as it was.
        let Some(data) = self.source.fetch(&round_id).await else {
            return Err(HostError::PayloadUnavailable { round_id });
        };

        self.payload = Some(CachedPayload {
            kind: PayloadKind::RoundData,
            data,
            meta: Some(round_id.clone()),
        });

        self.lobby.status = LobbyStatus::Loading;
        self.lobby.current_round_id = Some(round_id);
        self.lobby.round_deadline = None;
        self.lobby.loading_started_at = Some(now_millis());
        for player in &mut self.lobby.players {
            player.has_submitted = false;
            player.last_round_score = 0;
            player.last_round_distance = 0.0;
            player.load_progress = if player.is_host { 100 } else { 0 };
        }

        self.loading_since = Some(Instant::now());
        self.debounce_at = None;
        self.deadline_at = None;

        tracing::info!(
            code = %self.lobby.code,
            round_id = self.lobby.current_round_id.as_deref().unwrap_or(""),
            "round loading"
        );
        self.broadcast_snapshot();
        self.broadcast_payload();
        Ok(())
    }

    /// Fires on the loading poll: play begins once everyone is at 100%
    /// and the dwell floor has elapsed.
    fn poll_loading(&mut self) {
        if self.lobby.status != LobbyStatus::Loading {
            return;
        }
        let dwell_over = self
            .loading_since
            .is_some_and(|since| since.elapsed() >= self.config.loading_dwell);
        if dwell_over && self.lobby.all_loaded() {
            let _ = self.begin_play(false);
        }
    }

    fn begin_play(&mut self, forced: bool) -> Result<(), HostError> {
        let from = self.lobby.status;
        if !from.can_transition_to(LobbyStatus::Playing) {
            return Err(HostError::InvalidTransition {
                from,
                to: LobbyStatus::Playing,
            });
        }

        self.lobby.status = LobbyStatus::Playing;
        self.loading_since = None;
        if let Some(duration) = self.config.round_duration {
            self.deadline_at = Some(Instant::now() + duration);
            self.lobby.round_deadline = Some(now_millis() + duration.as_millis() as u64);
        }

        tracing::info!(code = %self.lobby.code, forced, "round playing");
        self.broadcast_snapshot();
        Ok(())
    }

    /// Ends the round. `forced` records non-submitters with score 0 and
    /// the sentinel distance; the debounce path requires everyone to
    /// have submitted already.
    fn finish_round(&mut self, forced: bool) {
        self.debounce_at = None;
        self.deadline_at = None;
        if self.lobby.status != LobbyStatus::Playing {
            return;
        }

        if forced {
            for player in &mut self.lobby.players {
                if !player.has_submitted {
                    player.has_submitted = true;
                    player.last_round_score = 0;
                    player.last_round_distance = DISTANCE_SENTINEL;
                    player.streak = 0;
                }
            }
        }

        self.lobby.status = LobbyStatus::RoundResults;
        self.lobby.rounds_played += 1;
        self.lobby.round_deadline = None;

        tracing::info!(
            code = %self.lobby.code,
            forced,
            rounds_played = self.lobby.rounds_played,
            "round finished"
        );
        self.broadcast_snapshot();
    }

    fn end_match(&mut self) -> Result<(), HostError> {
        let from = self.lobby.status;
        if !from.can_transition_to(LobbyStatus::Finished) {
            return Err(HostError::InvalidTransition {
                from,
                to: LobbyStatus::Finished,
            });
        }
        self.lobby.status = LobbyStatus::Finished;
        tracing::info!(code = %self.lobby.code, "match finished");
        self.broadcast_snapshot();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Link events and guest messages
    // -----------------------------------------------------------------

    fn handle_link_event(&mut self, event: LinkEvent<L>) {
        match event {
            LinkEvent::Opened { link, outbound } => {
                let link_id = link.id();
                tracing::debug!(%link_id, "link opened");
                self.links.insert(link_id, LinkEntry { link, outbound });
            }
            LinkEvent::Inbound { link_id, msg } => self.handle_message(link_id, msg),
            LinkEvent::Closed { link_id } => {
                // The player record stays; an idempotent rejoin picks it
                // back up.
                tracing::debug!(%link_id, "link closed");
                self.links.remove(&link_id);
                self.by_player.retain(|_, lid| *lid != link_id);
            }
        }
    }

    fn handle_message(&mut self, link_id: LinkId, msg: Message) {
        match msg {
            Message::JoinRequest { profile } => self.handle_join(link_id, profile),
            Message::Leave { player_id } => self.handle_leave(link_id, &player_id),
            Message::SubmitScore {
                player_id,
                score,
                distance,
                streak,
            } => self.apply_submit(&player_id, score, distance, streak),
            Message::ReportProgress {
                player_id,
                progress,
            } => self.handle_progress(&player_id, progress),
            Message::RequestPayload { player_id } => {
                tracing::debug!(%player_id, %link_id, "payload requested");
                self.send_payload_to(link_id);
            }
            Message::Chat { message } => self.handle_chat(message),
            Message::SyncLobby { .. }
            | Message::DataChunk { .. }
            | Message::Invite { .. }
            | Message::Error { .. } => {
                tracing::warn!(%link_id, "unexpected message on host link, dropped");
            }
        }
    }

    fn handle_join(&mut self, link_id: LinkId, profile: PlayerProfile) {
        if self.lobby.contains(&profile.id) {
            // Rejoin after a dropped link: re-associate, resend what the
            // client may have missed, and let the other guests see the
            // player is back.
            tracing::info!(player_id = %profile.id, %link_id, "rejoin, resending state");
            self.by_player.insert(profile.id, link_id);
            self.broadcast_snapshot();
            if matches!(
                self.lobby.status,
                LobbyStatus::Loading | LobbyStatus::Playing
            ) {
                self.send_payload_to(link_id);
            }
            return;
        }

        if self.lobby.players.len() >= self.config.effective_capacity() {
            tracing::info!(player_id = %profile.id, "join rejected, lobby full");
            self.send_to(
                link_id,
                Message::Error {
                    message: "lobby is full".into(),
                },
            );
            if let Some(entry) = self.links.get(&link_id) {
                let link = entry.link.clone();
                tokio::spawn(async move {
                    time::sleep(REJECT_GRACE).await;
                    link.close().await;
                });
            }
            return;
        }

        let player_id = profile.id.clone();
        if !self.lobby.add_player(profile) {
            return;
        }
        self.by_player.insert(player_id.clone(), link_id);
        tracing::info!(
            %player_id,
            players = self.lobby.players.len(),
            "player joined"
        );
        self.broadcast_snapshot();
        // A late joiner starts at 0% and needs the current round payload
        // or the loading phase could never complete.
        if matches!(
            self.lobby.status,
            LobbyStatus::Loading | LobbyStatus::Playing
        ) {
            self.send_payload_to(link_id);
        }
    }

    fn handle_leave(&mut self, link_id: LinkId, player_id: &PlayerId) {
        if !self.lobby.remove_player(player_id) {
            return;
        }
        tracing::info!(
            %player_id,
            players = self.lobby.players.len(),
            "player left"
        );
        self.by_player.remove(player_id);
        if let Some(entry) = self.links.remove(&link_id) {
            let link = entry.link;
            tokio::spawn(async move { link.close().await });
        }
        self.broadcast_snapshot();
    }

    fn apply_submit(&mut self, player_id: &PlayerId, score: u32, distance: f64, streak: u32) {
        if self.lobby.status != LobbyStatus::Playing {
            tracing::debug!(
                %player_id,
                status = %self.lobby.status,
                "submission outside playing, ignored"
            );
            return;
        }
        let Some(player) = self.lobby.player_mut(player_id) else {
            tracing::warn!(%player_id, "submission from unknown player, ignored");
            return;
        };
        if player.has_submitted {
            tracing::debug!(%player_id, "duplicate submission ignored");
            return;
        }

        player.has_submitted = true;
        player.last_round_score = score;
        player.last_round_distance = distance;
        player.streak = streak;
        player.total_score += score;

        self.broadcast_snapshot();
        if self.lobby.all_submitted() {
            self.debounce_at = Some(Instant::now() + self.config.results_debounce);
        }
    }

    /// Progress updates are not broadcast — the next heartbeat or
    /// transition snapshot carries them.
    fn handle_progress(&mut self, player_id: &PlayerId, progress: u8) {
        let Some(player) = self.lobby.player_mut(player_id) else {
            tracing::warn!(%player_id, "progress from unknown player, ignored");
            return;
        };
        player.load_progress = progress.min(100);
    }

    fn handle_chat(&mut self, message: ChatMessage) {
        self.chat.push(message.clone());
        self.broadcast(Message::Chat { message });
    }

    fn compose_host_chat(&self, text: String) -> ChatMessage {
        let sender_name = self
            .lobby
            .player(&self.lobby.host_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();
        ChatMessage {
            id: mint_chat_id(),
            sender_id: self.lobby.host_id.clone(),
            sender_name,
            text,
            timestamp: now_millis(),
        }
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    fn broadcast_snapshot(&self) {
        self.broadcast(Message::SyncLobby {
            lobby: self.lobby.clone(),
        });
    }

    /// Sends to every link that speaks for a player. Links whose
    /// `JoinRequest` has not been processed yet see no traffic — the
    /// join reply is the first frame a joiner ever receives, so a
    /// heartbeat can never masquerade as a join acknowledgment.
    fn broadcast(&self, msg: Message) {
        for link_id in self.by_player.values() {
            if let Some(entry) = self.links.get(link_id) {
                let _ = entry.outbound.send(msg.clone());
            }
        }
    }

    fn send_to(&self, link_id: LinkId, msg: Message) {
        if let Some(entry) = self.links.get(&link_id) {
            let _ = entry.outbound.send(msg);
        }
    }

    /// Broadcasts the cached payload to every joined link. Runs in a
    /// spawned task so the breather pacing never stalls the actor.
    fn broadcast_payload(&self) {
        let sinks: Vec<_> = self
            .by_player
            .values()
            .filter_map(|id| self.links.get(id))
            .map(|e| e.outbound.clone())
            .collect();
        self.spawn_payload_send(sinks);
    }

    /// Re-sends the cached payload to a single link.
    fn send_payload_to(&self, link_id: LinkId) {
        let Some(entry) = self.links.get(&link_id) else {
            return;
        };
        self.spawn_payload_send(vec![entry.outbound.clone()]);
    }

    fn spawn_payload_send(&self, sinks: Vec<mpsc::UnboundedSender<Message>>) {
        let Some(payload) = &self.payload else {
            tracing::debug!("no payload cached, nothing to send");
            return;
        };
        if sinks.is_empty() {
            return;
        }
        let chunks = split(payload.kind, &payload.data, payload.meta.clone());
        tokio::spawn(async move {
            let _ = send_paced::<std::convert::Infallible>(chunks, |msg| {
                for sink in &sinks {
                    let _ = sink.send(msg.clone());
                }
                Ok(())
            })
            .await;
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn mint_chat_id() -> String {
    let suffix: u32 = rand::rng().random_range(0..0x1_0000);
    format!("{}-{suffix:04x}", now_millis())
}
