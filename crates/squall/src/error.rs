//! Unified error type for the Squall stack.

use squall_chunk::ChunkError;
use squall_client::{ClientError, InviteError, JoinError};
use squall_link::LinkError;
use squall_lobby::HostError;
use squall_protocol::ProtocolError;

/// Top-level error wrapping every layer's error type.
///
/// Applications using the `squall` meta-crate deal with this single
/// type; the `#[from]` impls let `?` convert layer errors implicitly.
#[derive(Debug, thiserror::Error)]
pub enum SquallError {
    /// Link layer: rendezvous or transport failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Protocol layer: encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Chunk layer: structurally invalid fragment.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// Host engine: illegal transition, missing payload, actor gone.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Join controller: rejected or out of attempts.
    #[error(transparent)]
    Join(#[from] JoinError),

    /// Client actor: call against a stopped client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Presence: invite target unreachable.
    #[error(transparent)]
    Invite(#[from] InviteError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use squall_protocol::PlayerId;

    #[test]
    fn test_from_link_error() {
        let err: SquallError = LinkError::Closed.into();
        assert!(matches!(err, SquallError::Link(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let cause = serde_json::from_str::<squall_protocol::Lobby>("{").unwrap_err();
        let err: SquallError = ProtocolError::Decode(cause).into();
        assert!(matches!(err, SquallError::Protocol(_)));
        assert!(err.to_string().contains("decode failed"));
    }

    #[test]
    fn test_from_chunk_error() {
        let err: SquallError = ChunkError::ZeroTotal {
            group_id: "g1".into(),
        }
        .into();
        assert!(matches!(err, SquallError::Chunk(_)));
    }

    #[test]
    fn test_from_host_error() {
        let err: SquallError = HostError::Unavailable.into();
        assert!(matches!(err, SquallError::Host(_)));
    }

    #[test]
    fn test_from_join_error() {
        let err: SquallError = JoinError::AttemptsExhausted { attempts: 5 }.into();
        assert!(matches!(err, SquallError::Join(_)));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_from_invite_error() {
        let err: SquallError = InviteError::Unreachable {
            target: PlayerId::from("ghost"),
        }
        .into();
        assert_eq!(err.to_string(), "could not reach player ghost");
    }
}
