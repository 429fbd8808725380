//! XOR key space arithmetic.
//!
//! Peers are positioned in a 256-bit key space by hashing their identifiers
//! through SHA-256. Distance between two keys is their bitwise XOR read as a
//! big-endian unsigned integer; bucket placement uses the number of leading
//! bits two keys share.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::peer_id::PeerId;

/// Key width in bytes.
pub const KEY_LEN: usize = 32;

/// Key width in bits.
pub const KEY_BITS: usize = KEY_LEN * 8;

/// A position in the 256-bit XOR key space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Derive the key for a peer identifier.
    pub fn for_peer(id: &PeerId) -> Self {
        Self::for_bytes(id.as_bytes())
    }

    /// Hash arbitrary bytes into the key space.
    ///
    /// Used to target content keys as well as peers.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Key(digest.into())
    }

    /// Wrap an already-derived 32-byte key.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// XOR distance to another key.
    pub fn distance(&self, other: &Key) -> Distance {
        let mut out = [0u8; KEY_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Distance(out)
    }

    /// Number of leading bits this key shares with `other`, in `[0, 256]`.
    pub fn common_prefix_len(&self, other: &Key) -> usize {
        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            let diff = a ^ b;
            if diff != 0 {
                return i * 8 + diff.leading_zeros() as usize;
            }
        }
        KEY_BITS
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", hex::encode(&self.0[..8]))
    }
}

/// XOR distance between two keys.
///
/// The derived ordering on the byte array is exactly the big-endian unsigned
/// interpretation the Kademlia metric calls for.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance([u8; KEY_LEN]);

impl Distance {
    /// The raw distance bytes, most significant first.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({})", hex::encode(&self.0[..8]))
    }
}

/// Sort peers by ascending XOR distance of their keys to `target`.
///
/// The sort is stable, so peers whose identifiers collide onto the same key
/// keep their input order.
pub fn sort_closest<I>(peers: I, target: &Key) -> Vec<PeerId>
where
    I: IntoIterator<Item = PeerId>,
{
    let mut annotated: Vec<(Distance, PeerId)> = peers
        .into_iter()
        .map(|p| (Key::for_peer(&p).distance(target), p))
        .collect();
    annotated.sort_by(|a, b| a.0.cmp(&b.0));
    annotated.into_iter().map(|(_, p)| p).collect()
}
