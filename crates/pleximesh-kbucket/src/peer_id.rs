//! Opaque peer identifiers.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Length of the identifiers produced by [`PeerId::random`].
pub const RANDOM_ID_LEN: usize = 32;

/// An opaque peer identifier.
///
/// The routing table never interprets identifier bytes directly. Identifiers
/// are hashed into the key space on admission (see [`crate::keyspace::Key`]),
/// and compared byte-for-byte everywhere else.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    /// Wrap raw identifier bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        PeerId(bytes.into())
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; RANDOM_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        PeerId(bytes.to_vec())
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for PeerId {
    fn from(bytes: &[u8]) -> Self {
        PeerId(bytes.to_vec())
    }
}

impl From<Vec<u8>> for PeerId {
    fn from(bytes: Vec<u8>) -> Self {
        PeerId(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.0[..self.0.len().min(8)];
        write!(f, "{}", hex::encode(prefix))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_are_distinct() {
        let a = PeerId::random();
        let b = PeerId::random();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), RANDOM_ID_LEN);
    }

    #[test]
    fn test_round_trip_bytes() {
        let id = PeerId::new(b"local-peer".to_vec());
        assert_eq!(id.as_bytes(), b"local-peer");
        assert_eq!(id, PeerId::from(&b"local-peer"[..]));
    }

    #[test]
    fn test_display_abbreviates() {
        let id = PeerId::new(vec![0xab; 32]);
        assert_eq!(id.to_string(), "abababababababab");

        let short = PeerId::new(vec![0x01, 0x02]);
        assert_eq!(short.to_string(), "0102");
    }
}
