//! The replicated lobby aggregate and its state machine.
//!
//! The `Lobby` is owned exclusively by the host process; every client
//! holds a read-only copy that is overwritten wholesale on each
//! `SyncLobby`. All mutation helpers here preserve the aggregate
//! invariants — the replication engine calls them, clients never do.

use serde::{Deserialize, Serialize};

use crate::{Difficulty, PlayerId, PlayerProfile};

/// Hard capacity of a lobby.
pub const MAX_PLAYERS: usize = 20;

// ---------------------------------------------------------------------------
// LobbyStatus
// ---------------------------------------------------------------------------

/// The round state machine:
///
/// ```text
/// waiting → loading → playing → round_results ─┬→ loading (next round)
///                                              └→ finished (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    Waiting,
    Loading,
    Playing,
    RoundResults,
    Finished,
}

impl LobbyStatus {
    /// Returns `true` if transitioning to `target` is a legal edge of
    /// the state machine.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Loading)
                | (Self::Loading, Self::Playing)
                | (Self::Playing, Self::RoundResults)
                | (Self::RoundResults, Self::Loading)
                | (Self::RoundResults, Self::Finished)
        )
    }

    /// Returns `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::RoundResults => "round_results",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Per-participant record embedded in the lobby. Mutated only by the
/// host in response to validated messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_host: bool,
    pub has_submitted: bool,
    pub total_score: u32,
    pub last_round_score: u32,
    pub last_round_distance: f64,
    pub streak: u32,
    /// Payload download progress, 0–100. The host's own progress is 100
    /// by construction — it holds the payload.
    pub load_progress: u8,
}

impl Player {
    /// Creates a fresh player from a join profile.
    pub fn from_profile(profile: PlayerProfile, is_host: bool) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            is_host,
            has_submitted: false,
            total_score: 0,
            last_round_score: 0,
            last_round_distance: 0.0,
            streak: 0,
            load_progress: if is_host { 100 } else { 0 },
        }
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// The root replicated aggregate.
///
/// Invariants (upheld by the mutators below, checked by tests):
/// - exactly one player has `is_host == true`, and its id equals `host_id`
/// - player ids are unique; insertion order is join order
/// - `players.len() <= MAX_PLAYERS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lobby {
    /// Session code — also the link rendezvous key.
    pub code: String,
    pub host_id: PlayerId,
    pub status: LobbyStatus,
    /// Set once at creation.
    pub difficulty: Difficulty,
    pub players: Vec<Player>,
    pub current_round_id: Option<String>,
    /// Deadline for a forced finish, epoch millis.
    pub round_deadline: Option<u64>,
    /// When the current loading phase began, epoch millis. Replicated so
    /// clients can render the dwell countdown.
    pub loading_started_at: Option<u64>,
    pub rounds_played: u32,
    pub created_at: u64,
}

impl Lobby {
    /// Creates a lobby with the host as its sole player.
    pub fn new(
        code: impl Into<String>,
        host: PlayerProfile,
        difficulty: Difficulty,
        created_at: u64,
    ) -> Self {
        let host_id = host.id.clone();
        Self {
            code: code.into(),
            host_id,
            status: LobbyStatus::Waiting,
            difficulty,
            players: vec![Player::from_profile(host, true)],
            current_round_id: None,
            round_deadline: None,
            loading_started_at: None,
            rounds_played: 0,
            created_at,
        }
    }

    /// Looks up a player by identity.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Mutable lookup; host-side handlers only.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Returns `true` if the identity is already present.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Returns `true` when no more players can join.
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Appends a new player at the end (join order). Returns `false`
    /// without mutating when the lobby is full or the id is taken —
    /// callers decide whether that is an error or an idempotent rejoin.
    pub fn add_player(&mut self, profile: PlayerProfile) -> bool {
        if self.is_full() || self.contains(&profile.id) {
            return false;
        }
        self.players.push(Player::from_profile(profile, false));
        true
    }

    /// Removes a player. Returns `true` if one was removed.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| &p.id != id);
        self.players.len() != before
    }

    /// Returns `true` once every player has submitted this round.
    pub fn all_submitted(&self) -> bool {
        self.players.iter().all(|p| p.has_submitted)
    }

    /// Returns `true` once every player reports full payload download.
    pub fn all_loaded(&self) -> bool {
        self.players.iter().all(|p| p.load_progress >= 100)
    }
}

// =========================================================================
// Tests
// =========================================================================
