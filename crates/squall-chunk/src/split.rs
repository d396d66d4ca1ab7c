//! Sender side: fragmenting a payload into chunk messages.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use squall_protocol::{Message, PayloadKind};

/// Size of each fragment's data field, in bytes.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// After this many chunks in a row the sender takes a short breather,
/// yielding the event loop to heartbeats and inbound traffic.
pub const YIELD_EVERY: usize = 10;

/// Length of the breather pause between chunk bursts.
const BREATHER: Duration = Duration::from_millis(50);

/// Alphabet for the random group-id suffix.
const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 4;

// ---------------------------------------------------------------------------
// GroupId
// ---------------------------------------------------------------------------

/// Identifier of one transfer. Minted by the sender; every fragment of
/// the transfer carries it so the receiver can keep concurrent transfers
/// apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Mints a fresh id: epoch milliseconds plus a short random suffix.
    /// The timestamp makes ids sortable in logs; the suffix keeps two
    /// transfers started in the same millisecond distinct.
    pub fn mint() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
            .collect();

        Self(format!("{millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// split / send_paced
// ---------------------------------------------------------------------------

/// Fragments `payload` into [`Message::DataChunk`]s under a fresh group
/// id. Every chunk carries the group's `total` and the caller's `meta`,
/// so a receiver can start from any fragment.
///
/// An empty payload still produces one (empty) chunk — the receiver
/// completes the transfer instead of waiting forever for data that
/// never comes.
pub fn split(kind: PayloadKind, payload: &[u8], meta: Option<String>) -> Vec<Message> {
    let group_id = GroupId::mint();
    let total = payload.len().div_ceil(CHUNK_SIZE).max(1) as u32;

    tracing::debug!(
        group_id = %group_id,
        ?kind,
        bytes = payload.len(),
        total,
        "splitting payload"
    );

    if payload.is_empty() {
        return vec![Message::DataChunk {
            kind,
            group_id: group_id.into(),
            index: 0,
            total: 1,
            data: Vec::new(),
            meta,
        }];
    }

    payload
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(index, data)| Message::DataChunk {
            kind,
            group_id: group_id.to_string(),
            index: index as u32,
            total,
            data: data.to_vec(),
            meta: meta.clone(),
        })
        .collect()
}

/// Pushes chunks through `send` in order, sleeping for a short breather
/// after every [`YIELD_EVERY`] chunks. `send` is synchronous on purpose:
/// callers hand in a closure that feeds an unbounded queue, and the
/// pacing here is what keeps that queue from swallowing a whole transfer
/// in one tick.
pub async fn send_paced<E>(
    chunks: Vec<Message>,
    mut send: impl FnMut(Message) -> Result<(), E>,
) -> Result<(), E> {
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 && i % YIELD_EVERY == 0 {
            tokio::time::sleep(BREATHER).await;
        }
        send(chunk)?;
    }
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================
