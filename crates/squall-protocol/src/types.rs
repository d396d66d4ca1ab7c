//! Core wire types: identities, message variants, and chunk metadata.
//!
//! Every type here travels on a link as bytes. Messages are immutable
//! once sent and carry no references to links or local state.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::Lobby;

/// Distance recorded for players who never submitted when a round is
/// force-ended. Large enough to sort last under any scoring formula.
pub const DISTANCE_SENTINEL: f64 = 99_999.0;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant identity, issued by the external identity provider.
///
/// A newtype over the provider's opaque id string: a `PlayerId` can't be
/// confused with a display name or a session code, even though all three
/// are strings underneath.
///
/// `#[serde(transparent)]` keeps the wire shape a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The public profile a participant presents when joining: identity plus
/// the display fields other players see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable identity from the identity provider.
    pub id: PlayerId,
    /// Name shown to other participants.
    pub display_name: String,
    /// Optional avatar reference (URL or asset id).
    pub avatar_url: Option<String>,
}

impl PlayerProfile {
    /// Convenience constructor without an avatar.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: PlayerId(id.into()),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

/// Session-wide difficulty, set once at lobby creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Expert,
    Master,
}

// ---------------------------------------------------------------------------
// Chunked payloads
// ---------------------------------------------------------------------------

/// Semantic tag carried alongside chunks so the receiver knows what the
/// reassembled payload *is* without inspecting the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// The full round payload (event metadata).
    RoundData,
    /// A single map layer image.
    LayerImage,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One chat line. Relayed by the host to every link; clients keep an
/// append-only log of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender-minted unique id, used for de-duplication in logs.
    pub id: String,
    pub sender_id: PlayerId,
    pub sender_name: String,
    pub text: String,
    /// Epoch milliseconds at the sender.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Message — the closed variant set
// ---------------------------------------------------------------------------

/// Every message exchanged over a link.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, so the wire
/// format is self-describing:
/// `{ "type": "SubmitScore", "player_id": "u1", ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Host → client: full lobby snapshot, replacing the client's copy
    /// wholesale.
    SyncLobby { lobby: Lobby },

    /// Client → host: request to join the lobby. Idempotent — a known
    /// identity gets the current snapshot back instead of a duplicate
    /// entry.
    JoinRequest { profile: PlayerProfile },

    /// Client → host: leave the lobby.
    Leave { player_id: PlayerId },

    /// Client → host: this round's result for one player.
    SubmitScore {
        player_id: PlayerId,
        score: u32,
        distance: f64,
        streak: u32,
    },

    /// Client → host: payload download progress, 0–100.
    ReportProgress { player_id: PlayerId, progress: u8 },

    /// Client → host: re-send the current round payload (late join or
    /// detected gap).
    RequestPayload { player_id: PlayerId },

    /// Either direction: one fragment of an oversized payload.
    DataChunk {
        kind: PayloadKind,
        /// Unique per transfer; minted by the sender.
        group_id: String,
        index: u32,
        total: u32,
        data: Vec<u8>,
        /// Optional caller metadata delivered with the reassembled
        /// payload (e.g. a round id).
        meta: Option<String>,
    },

    /// Either direction; the host relays client chat to everyone.
    Chat { message: ChatMessage },

    /// Presence subsystem only: an out-of-band invitation.
    Invite { lobby_code: String, host_name: String },

    /// Host → client: a request was rejected (e.g. lobby full).
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is consumed by snapshots stored in logs and by
    //! any future non-Rust client, so these tests pin the exact JSON
    //! shapes the serde attributes produce.

    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::from("u-42")).unwrap();
        assert_eq!(json, "\"u-42\"");
    }

    #[test]
    fn test_player_id_deserializes_from_plain_string() {
        let pid: PlayerId = serde_json::from_str("\"u-42\"").unwrap();
        assert_eq!(pid, PlayerId::from("u-42"));
    }

    #[test]
    fn test_difficulty_serializes_snake_case() {
        let json = serde_json::to_string(&Difficulty::Intermediate).unwrap();
        assert_eq!(json, "\"intermediate\"");
    }

    #[test]
    fn test_payload_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PayloadKind::RoundData).unwrap(),
            "\"round_data\""
        );
        assert_eq!(
            serde_json::to_string(&PayloadKind::LayerImage).unwrap(),
            "\"layer_image\""
        );
    }

    #[test]
    fn test_message_is_internally_tagged() {
        let msg = Message::ReportProgress {
            player_id: PlayerId::from("u1"),
            progress: 40,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "ReportProgress");
        assert_eq!(json["player_id"], "u1");
        assert_eq!(json["progress"], 40);
    }

    #[test]
    fn test_data_chunk_round_trip() {
        let msg = Message::DataChunk {
            kind: PayloadKind::RoundData,
            group_id: "1700000000000-x4k".into(),
            index: 2,
            total: 3,
            data: vec![1, 2, 3],
            meta: Some("evt-9".into()),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_submit_score_round_trip() {
        let msg = Message::SubmitScore {
            player_id: PlayerId::from("u1"),
            score: 850,
            distance: 12.5,
            streak: 3,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_join_request_without_avatar_round_trip() {
        let msg = Message::JoinRequest {
            profile: PlayerProfile::new("u1", "Ana"),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_invite_json_format() {
        let msg = Message::Invite {
            lobby_code: "AB12CD".into(),
            host_name: "Ana".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Invite");
        assert_eq!(json["lobby_code"], "AB12CD");
        assert_eq!(json["host_name"], "Ana");
    }

    #[test]
    fn test_chat_round_trip() {
        let msg = Message::Chat {
            message: ChatMessage {
                id: "m1".into(),
                sender_id: PlayerId::from("u1"),
                sender_name: "Ana".into(),
                text: "boa sorte!".into(),
                timestamp: 1_700_000_000_000,
            },
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<Message, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_type_returns_error() {
        let unknown = r#"{"type": "SelfDestruct", "when": "now"}"#;
        let result: Result<Message, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
