//! Error types for the protocol layer.
//!
//! Each crate in Squall defines its own error enum, so a `ProtocolError`
//! always means a serialization problem — never networking or lobby
//! logic.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed. The inner `serde_json::Error` is wrapped so
    /// callers handle `ProtocolError` uniformly regardless of codec.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong
    /// types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
