//! The payload lookup boundary.

use std::future::Future;

/// Where round payloads come from.
///
/// The engine treats payloads as opaque bytes; fetching, caching, and
/// whatever "round data" actually contains belong to the application.
/// Queried when a round starts and again on every late
/// [`RequestPayload`](squall_protocol::Message::RequestPayload).
/// Desugared with an explicit `Send` bound — the host actor awaiting
/// `fetch` runs inside a spawned task.
pub trait PayloadSource: Send + Sync + 'static {
    /// Returns the payload for `round_id`, or `None` if the id is
    /// unknown.
    fn fetch(&self, round_id: &str) -> impl Future<Output = Option<Vec<u8>>> + Send;
}

/// A fixed in-memory payload table. Handy for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticPayloads {
    rounds: std::collections::HashMap<String, Vec<u8>>,
}

impl StaticPayloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, round_id: impl Into<String>, payload: Vec<u8>) -> Self {
        self.rounds.insert(round_id.into(), payload);
        self
    }
}

impl PayloadSource for StaticPayloads {
    async fn fetch(&self, round_id: &str) -> Option<Vec<u8>> {
        self.rounds.get(round_id).cloned()
    }
}
