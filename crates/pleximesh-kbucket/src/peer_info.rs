//! Per-peer records held by buckets.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::keyspace::Key;
use crate::peer_id::PeerId;

/// The record a bucket keeps for one admitted peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer identifier.
    pub id: PeerId,

    /// Key derived from the identifier, cached at admission.
    pub key: Key,

    /// When we last completed a useful outbound query to this peer.
    /// `None` means never: the peer was merely heard of, or admitted as a
    /// non-query peer.
    pub last_useful_outbound_query: Option<SystemTime>,

    /// When the peer was admitted to its bucket.
    pub added_at: SystemTime,
}

impl PeerInfo {
    /// Build a record for a freshly admitted peer, deriving its key.
    pub fn new(id: PeerId, last_useful_outbound_query: Option<SystemTime>) -> Self {
        let key = Key::for_peer(&id);
        PeerInfo {
            id,
            key,
            last_useful_outbound_query,
            added_at: SystemTime::now(),
        }
    }

    /// Whether this peer's last useful interaction is older than `ttl`.
    ///
    /// A peer that was never usefully contacted is not stale: it has no
    /// usefulness record to age out, so it is never eligible for
    /// TTL-gated replacement.
    pub fn is_stale(&self, ttl: Duration, now: SystemTime) -> bool {
        match self.last_useful_outbound_query {
            Some(at) => now.duration_since(at).map_or(false, |age| age > ttl),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_caches_key() {
        let id = PeerId::new(b"peer".to_vec());
        let info = PeerInfo::new(id.clone(), None);
        assert_eq!(info.key, Key::for_peer(&id));
        assert!(info.last_useful_outbound_query.is_none());
    }

    #[test]
    fn test_never_useful_is_never_stale() {
        let info = PeerInfo::new(PeerId::random(), None);
        assert!(!info.is_stale(Duration::ZERO, SystemTime::now()));
    }

    #[test]
    fn test_staleness_is_strict() {
        let now = SystemTime::now();
        let ttl = Duration::from_secs(60 * 60);

        let fresh = PeerInfo::new(PeerId::random(), Some(now));
        assert!(!fresh.is_stale(ttl, now));

        let old = PeerInfo::new(
            PeerId::random(),
            Some(now - Duration::from_secs(2 * 60 * 60)),
        );
        assert!(old.is_stale(ttl, now));

        // Exactly at the boundary is not yet stale.
        let boundary = PeerInfo::new(PeerId::random(), Some(now - ttl));
        assert!(!boundary.is_stale(ttl, now));
    }

    #[test]
    fn test_timestamp_from_the_future_is_not_stale() {
        let now = SystemTime::now();
        let ahead = PeerInfo::new(PeerId::random(), Some(now + Duration::from_secs(60)));
        assert!(!ahead.is_stale(Duration::ZERO, now));
    }
}
