//! Session codes: the rendezvous keys that links are established through.

use std::fmt;

use rand::Rng;

/// Alphabet for generated codes. No lowercase — codes are read aloud and
/// typed by players.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a generated lobby code.
const CODE_LEN: usize = 6;

/// A rendezvous key identifying one bindable endpoint on a [`Network`].
///
/// Lobby codes are short generated strings (`"AB12CD"`); presence
/// addresses are derived deterministically from a participant identity
/// so that anyone who knows the identity can dial it.
///
/// [`Network`]: crate::Network
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCode(String);

impl SessionCode {
    /// Wraps an existing code string (e.g. one typed in by a player).
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates a fresh 6-character lobby code.
    ///
    /// Uniqueness is not guaranteed — the caller must handle
    /// [`LinkError::UnavailableCode`](crate::LinkError::UnavailableCode)
    /// by regenerating.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code: String = (0..CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..CODE_ALPHABET.len());
                CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Derives the presence address for a participant identity.
    ///
    /// Stable per identity, so invites can be addressed to anyone who
    /// has registered presence.
    pub fn presence(identity: &str) -> Self {
        Self(format!("PRESENCE-{identity}"))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_six_uppercase_alnum_chars() {
        let code = SessionCode::generate();
        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_is_not_constant() {
        // Two draws colliding is possible but astronomically unlikely
        // to happen repeatedly.
        let distinct = (0..8)
            .map(|_| SessionCode::generate())
            .collect::<std::collections::HashSet<_>>();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_presence_is_stable_per_identity() {
        assert_eq!(
            SessionCode::presence("user-1"),
            SessionCode::presence("user-1")
        );
        assert_ne!(
            SessionCode::presence("user-1"),
            SessionCode::presence("user-2")
        );
    }

    #[test]
    fn test_display_round_trips() {
        let code = SessionCode::new("AB12CD");
        assert_eq!(code.to_string(), "AB12CD");
        assert_eq!(SessionCode::from("AB12CD"), code);
    }
}
