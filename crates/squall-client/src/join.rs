//! The join controller: bounded connect/handshake attempts.

use tokio::time::{self, Duration, timeout};

use squall_link::{Link, LinkError, Network, SessionCode};
use squall_protocol::{Codec, JsonCodec, Lobby, Message, PlayerProfile, ProtocolError};

use crate::{ClientHandle, JoinError, client};

/// Retry policy for [`join`].
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Total attempts before [`JoinError::AttemptsExhausted`].
    pub max_attempts: u32,

    /// Deadline per attempt, covering connect, the `JoinRequest`, and
    /// waiting for the first snapshot.
    pub attempt_timeout: Duration,

    /// Linear backoff step: attempt *n* waits `step * (n - 1)` first.
    pub backoff_step: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(10),
            backoff_step: Duration::from_secs(1),
        }
    }
}

/// What one attempt produced.
enum Handshake {
    Joined(Lobby),
    Rejected(String),
}

/// Transient attempt failures. Logged, never surfaced individually.
#[derive(Debug, thiserror::Error)]
enum AttemptFailure {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no snapshot within the attempt deadline")]
    TimedOut,
}

/// Joins the lobby at `code`.
///
/// Attempt state machine: connect, send `JoinRequest`, wait for the
/// first `SyncLobby` under the per-attempt deadline. A dropped link or
/// a timeout fails the attempt and is retried with linear backoff; a
/// host `Error` reply is terminal. Always resolves within
/// `max_attempts * (attempt_timeout + backoff)`.
pub async fn join<N: Network>(
    network: &N,
    code: &SessionCode,
    profile: PlayerProfile,
    config: JoinConfig,
) -> Result<ClientHandle, JoinError> {
    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            let backoff = config.backoff_step * (attempt - 1);
            tracing::info!(%code, attempt, ?backoff, "retrying join");
            time::sleep(backoff).await;
        }

        match attempt_join(network, code, &profile, config.attempt_timeout).await {
            Ok((link, Handshake::Joined(lobby))) => {
                tracing::info!(%code, attempt, "joined lobby");
                return Ok(client::spawn_client(link, profile, lobby));
            }
            Ok((link, Handshake::Rejected(message))) => {
                tracing::info!(%code, %message, "join rejected by host");
                link.close().await;
                return Err(JoinError::Rejected { message });
            }
            Err(err) => {
                tracing::debug!(%code, attempt, %err, "join attempt failed");
            }
        }
    }

    Err(JoinError::AttemptsExhausted {
        attempts: config.max_attempts,
    })
}

async fn attempt_join<N: Network>(
    network: &N,
    code: &SessionCode,
    profile: &PlayerProfile,
    deadline: Duration,
) -> Result<(N::Link, Handshake), AttemptFailure> {
    let link = network.connect(code).await?;

    let request = JsonCodec.encode(&Message::JoinRequest {
        profile: profile.clone(),
    })?;
    link.send(&request).await?;

    let result = timeout(deadline, await_snapshot(&link)).await;
    match result {
        Ok(Ok(handshake)) => Ok((link, handshake)),
        Ok(Err(err)) => {
            link.close().await;
            Err(err)
        }
        Err(_) => {
            link.close().await;
            Err(AttemptFailure::TimedOut)
        }
    }
}

/// Reads frames until the first snapshot or rejection. Traffic relayed
/// before the join was processed (chat, say) is skipped; the snapshot is
/// guaranteed to precede any payload chunks by per-link ordering.
async fn await_snapshot<L: Link>(link: &L) -> Result<Handshake, AttemptFailure> {
    loop {
        match link.recv().await? {
            Some(frame) => match JsonCodec.decode::<Message>(&frame) {
                Ok(Message::SyncLobby { lobby }) => return Ok(Handshake::Joined(lobby)),
                Ok(Message::Error { message }) => return Ok(Handshake::Rejected(message)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "undecodable frame during join, skipped");
                }
            },
            None => return Err(LinkError::Closed.into()),
        }
    }
}
