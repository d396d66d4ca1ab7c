//! Codec trait and implementations for serializing messages.
//!
//! The engines don't care how messages become bytes — they go through
//! the [`Codec`] trait. [`JsonCodec`] is the default (human-readable,
//! debuggable in any log); a binary codec can be swapped in later
//! without touching the engines.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because codecs are stored in long-lived
/// actor tasks and may be used from any runtime thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`. Behind the `json` feature
/// (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Message, PlayerId};

    #[test]
    fn test_json_codec_round_trips_a_message() {
        let codec = JsonCodec;
        let msg = Message::RequestPayload {
            player_id: PlayerId::from("u1"),
        };

        let bytes = codec.encode(&msg).unwrap();
        let decoded: Message = codec.decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_json_codec_decode_failure_is_an_error() {
        let codec = JsonCodec;
        let result: Result<Message, _> = codec.decode(b"{\"type\":");
        assert!(result.is_err());
    }
}
