//! Configuration for the host engine.

use std::time::Duration;

use squall_protocol::MAX_PLAYERS;

/// Timing and capacity knobs for a hosted lobby.
///
/// The defaults are the production values; tests shrink them (or drive
/// them with a paused clock) to keep runs fast.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Maximum players, host included. Clamped to
    /// [`MAX_PLAYERS`](squall_protocol::MAX_PLAYERS).
    pub capacity: usize,

    /// While `waiting`, the snapshot is re-broadcast at this cadence
    /// even without changes, so clients that missed an update converge.
    pub heartbeat: Duration,

    /// Cadence of the loading-completion check.
    pub loading_poll: Duration,

    /// Minimum time spent in `loading`, even when every player reports
    /// 100% immediately. Absorbs progress reports still in flight.
    pub loading_dwell: Duration,

    /// Grace after the last score submission before the round ends, so
    /// near-simultaneous submissions land in the same round.
    pub results_debounce: Duration,

    /// Optional wall-clock limit per round. When set, the round is
    /// force-ended at the deadline and the deadline is replicated so
    /// clients can render a countdown.
    pub round_duration: Option<Duration>,

    /// How many fresh session codes to try when `listen` reports the
    /// code already bound.
    pub code_retries: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_PLAYERS,
            heartbeat: Duration::from_secs(2),
            loading_poll: Duration::from_secs(1),
            loading_dwell: Duration::from_secs(10),
            results_debounce: Duration::from_secs(1),
            round_duration: None,
            code_retries: 8,
        }
    }
}

impl HostConfig {
    pub(crate) fn effective_capacity(&self) -> usize {
        self.capacity.min(MAX_PLAYERS)
    }
}
