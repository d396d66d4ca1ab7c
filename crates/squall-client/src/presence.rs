//! Presence & invites: reaching a player who is not in any lobby yet.
//!
//! Registration binds a listener on an address derived from the player's
//! identity ([`SessionCode::presence`]), so anyone who knows the
//! identity can dial it. An invite is a single fire-and-forget message
//! on a short-lived link; accepting one is simply
//! [`join`](crate::join) with the carried code.

use tokio::sync::mpsc;
use tokio::time::{self, Duration, timeout};

use squall_link::{Link, LinkError, Listener, Network, SessionCode};
use squall_protocol::{Codec, JsonCodec, Message, PlayerId};

use crate::InviteError;

/// How long an incoming presence link gets to deliver its invite.
const INVITE_DEADLINE: Duration = Duration::from_secs(10);

/// Linger before closing an outgoing invite link, so the frame is not
/// cut off mid-flush.
const INVITE_LINGER: Duration = Duration::from_millis(100);

/// An invitation received through presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub lobby_code: String,
    pub host_name: String,
}

/// A registered presence endpoint. Dropping it unregisters.
pub struct Presence {
    invites: mpsc::UnboundedReceiver<Invite>,
}

impl Presence {
    /// Binds the identity's presence address and starts accepting
    /// invite links.
    ///
    /// # Errors
    /// [`LinkError::UnavailableCode`] if this identity already has a
    /// presence registered on the network (another process, usually).
    pub async fn register<N: Network>(
        network: &N,
        identity: &PlayerId,
    ) -> Result<Self, LinkError> {
        let code = SessionCode::presence(identity.as_str());
        let listener = network.listen(&code).await?;
        tracing::debug!(%identity, "presence registered");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_invites(listener, tx));
        Ok(Self { invites: rx })
    }

    /// The next invite, or `None` once presence has shut down.
    pub async fn next_invite(&mut self) -> Option<Invite> {
        self.invites.recv().await
    }
}

async fn accept_invites<Li: Listener>(mut listener: Li, invites: mpsc::UnboundedSender<Invite>) {
    while let Some(link) = listener.accept().await {
        let invites = invites.clone();
        tokio::spawn(async move {
            if let Some(invite) = read_invite(&link).await {
                let _ = invites.send(invite);
            }
            link.close().await;
        });
    }
}

/// Reads frames until one decodes to an `Invite`, then stops. Anything
/// else on a presence link is noise.
async fn read_invite<L: Link>(link: &L) -> Option<Invite> {
    let read = timeout(INVITE_DEADLINE, async {
        loop {
            match link.recv().await {
                Ok(Some(frame)) => match JsonCodec.decode::<Message>(&frame) {
                    Ok(Message::Invite {
                        lobby_code,
                        host_name,
                    }) => {
                        return Some(Invite {
                            lobby_code,
                            host_name,
                        });
                    }
                    Ok(_) => {
                        tracing::debug!("non-invite message on presence link, skipped");
                    }
                    Err(err) => {
                        tracing::warn!(%err, "undecodable frame on presence link");
                    }
                },
                Ok(None) | Err(_) => return None,
            }
        }
    })
    .await;

    read.unwrap_or(None)
}

/// Delivers an invite to `target`'s presence address.
///
/// Whatever fails underneath — nothing bound, relay unreachable, link
/// dropped — collapses into [`InviteError::Unreachable`]; an invite
/// either arrives or the target "could not be reached".
pub async fn send_invite<N: Network>(
    network: &N,
    target: &PlayerId,
    lobby_code: &str,
    host_name: &str,
) -> Result<(), InviteError> {
    let unreachable = || InviteError::Unreachable {
        target: target.clone(),
    };

    let code = SessionCode::presence(target.as_str());
    let link = network.connect(&code).await.map_err(|err| {
        tracing::info!(%target, %err, "invite target unreachable");
        unreachable()
    })?;

    let msg = Message::Invite {
        lobby_code: lobby_code.to_string(),
        host_name: host_name.to_string(),
    };
    let bytes = JsonCodec.encode(&msg).map_err(|_| unreachable())?;
    let sent = link.send(&bytes).await;

    time::sleep(INVITE_LINGER).await;
    link.close().await;

    sent.map_err(|err| {
        tracing::info!(%target, %err, "invite delivery failed");
        unreachable()
    })?;
    tracing::debug!(%target, lobby_code, "invite sent");
    Ok(())
}
