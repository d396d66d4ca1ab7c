//! Receiver side: collecting fragments back into payloads.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use squall_protocol::PayloadKind;

use crate::ChunkError;

/// A payload that finished reassembling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub kind: PayloadKind,
    pub data: Vec<u8>,
    /// The `meta` the sender attached to the transfer.
    pub meta: Option<String>,
}

/// One in-flight transfer. Slots are allocated lazily on the first
/// fragment, so arrival order doesn't matter.
struct Transfer {
    kind: PayloadKind,
    total: u32,
    slots: Vec<Option<Vec<u8>>>,
    filled: u32,
    meta: Option<String>,
    last_touch: Instant,
}

/// Collects [`DataChunk`](squall_protocol::Message::DataChunk) fragments
/// across any number of concurrent transfers.
///
/// Tolerates out-of-order arrival and duplicate fragments; completes each
/// transfer exactly once. Transfers whose sender went away are reclaimed
/// by [`sweep_stale`](Assembler::sweep_stale).
#[derive(Default)]
pub struct Assembler {
    transfers: HashMap<String, Transfer>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one fragment. Returns `Ok(Some(_))` exactly when this
    /// fragment completes its transfer; the transfer's state is dropped
    /// at that point, so a straggling duplicate afterwards starts a new
    /// (never-completing, eventually swept) transfer rather than a
    /// double delivery.
    pub fn accept(
        &mut self,
        kind: PayloadKind,
        group_id: &str,
        index: u32,
        total: u32,
        data: Vec<u8>,
        meta: Option<String>,
    ) -> Result<Option<Reassembled>, ChunkError> {
        if total == 0 {
            return Err(ChunkError::ZeroTotal {
                group_id: group_id.to_string(),
            });
        }
        if index >= total {
            return Err(ChunkError::IndexOutOfRange {
                group_id: group_id.to_string(),
                index,
                total,
            });
        }

        let transfer = self
            .transfers
            .entry(group_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(group_id, ?kind, total, "transfer started");
                Transfer {
                    kind,
                    total,
                    slots: vec![None; total as usize],
                    filled: 0,
                    meta: None,
                    last_touch: Instant::now(),
                }
            });

        if transfer.total != total {
            return Err(ChunkError::TotalMismatch {
                group_id: group_id.to_string(),
                expected: transfer.total,
                got: total,
            });
        }

        transfer.last_touch = Instant::now();
        if transfer.meta.is_none() {
            transfer.meta = meta;
        }

        // Duplicate fragments overwrite their slot without advancing the
        // fill count.
        let slot = &mut transfer.slots[index as usize];
        if slot.is_none() {
            transfer.filled += 1;
        }
        *slot = Some(data);

        if transfer.filled < transfer.total {
            return Ok(None);
        }

        let Some(transfer) = self.transfers.remove(group_id) else {
            return Ok(None);
        };
        tracing::debug!(group_id, total, "transfer complete");

        let mut data = Vec::new();
        for slot in transfer.slots {
            data.extend(slot.unwrap_or_default());
        }
        Ok(Some(Reassembled {
            kind: transfer.kind,
            data,
            meta: transfer.meta,
        }))
    }

    /// Fill ratio of one transfer as a 0–100 percentage, or `None` if the
    /// group is unknown (not started, or already completed).
    pub fn progress(&self, group_id: &str) -> Option<u8> {
        self.transfers
            .get(group_id)
            .map(|t| (t.filled * 100 / t.total) as u8)
    }

    /// Number of transfers still in flight.
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }

    /// Drops transfers that haven't received a fragment within `ttl` and
    /// returns how many were dropped. Called periodically by the owning
    /// actor.
    pub fn sweep_stale(&mut self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.transfers.len();
        self.transfers.retain(|group_id, t| {
            let fresh = now.duration_since(t.last_touch) < ttl;
            if !fresh {
                tracing::warn!(
                    group_id,
                    filled = t.filled,
                    total = t.total,
                    "dropping stale transfer"
                );
            }
            fresh
        });
        before - self.transfers.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
