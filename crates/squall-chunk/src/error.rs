//! Error types for the chunk layer.

/// Errors raised while validating incoming chunks.
///
/// A `ChunkError` always means the *sender* produced an inconsistent
/// fragment; a well-behaved peer never triggers one, so receivers log
/// and drop rather than tear the link down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// A chunk declared `total == 0`, which can never complete.
    #[error("chunk group {group_id} declared zero total chunks")]
    ZeroTotal { group_id: String },

    /// A chunk's index is outside the declared range.
    #[error("chunk group {group_id} index {index} out of range (total {total})")]
    IndexOutOfRange {
        group_id: String,
        index: u32,
        total: u32,
    },

    /// A later chunk disagreed with the group's declared total.
    #[error("chunk group {group_id} total changed from {expected} to {got}")]
    TotalMismatch {
        group_id: String,
        expected: u32,
        got: u32,
    },
}
