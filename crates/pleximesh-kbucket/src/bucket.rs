//! Bounded, recency-ordered peer buckets.

use std::collections::VecDeque;

use crate::keyspace::Key;
use crate::peer_id::PeerId;
use crate::peer_info::PeerInfo;

/// One routing bucket: an ordered sequence of peer records.
///
/// Front is the most recently useful peer; the back holds the first
/// candidates for eviction. Capacity is enforced by the routing table, not
/// here.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    list: VecDeque<PeerInfo>,
}

impl Bucket {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Bucket {
            list: VecDeque::new(),
        }
    }

    /// Number of peers in the bucket.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the bucket holds no peers.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterate the records head-first.
    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.list.iter()
    }

    /// Snapshot of the records, head-first.
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.list.iter().cloned().collect()
    }

    /// Find a record by peer identifier.
    pub fn get_peer(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.list.iter().find(|info| &info.id == id)
    }

    /// Find a record by peer identifier, mutably.
    pub fn get_peer_mut(&mut self, id: &PeerId) -> Option<&mut PeerInfo> {
        self.list.iter_mut().find(|info| &info.id == id)
    }

    /// Find a record by derived key, mutably.
    ///
    /// Distinct identifiers can in principle hash onto the same key; the
    /// admission path uses this to let the later insertion win in place.
    pub fn get_peer_by_key_mut(&mut self, key: &Key) -> Option<&mut PeerInfo> {
        self.list.iter_mut().find(|info| &info.key == key)
    }

    /// Insert a record at the head. The caller ensures the peer is not
    /// already present.
    pub fn push_front(&mut self, info: PeerInfo) {
        self.list.push_front(info);
    }

    /// Remove a record by peer identifier; reports whether it was present.
    pub fn remove(&mut self, id: &PeerId) -> bool {
        if let Some(pos) = self.list.iter().position(|info| &info.id == id) {
            self.list.remove(pos);
            true
        } else {
            false
        }
    }

    /// Reposition an existing record at the head.
    pub fn move_to_front(&mut self, id: &PeerId) {
        if let Some(pos) = self.list.iter().position(|info| &info.id == id) {
            if let Some(info) = self.list.remove(pos) {
                self.list.push_front(info);
            }
        }
    }

    /// The record minimising `score`, or `None` if the bucket is empty.
    /// Ties keep the entry closest to the head.
    pub fn min_by<K: Ord>(&self, score: impl Fn(&PeerInfo) -> K) -> Option<&PeerInfo> {
        self.list.iter().min_by_key(|info| score(info))
    }

    /// Partition in place around a common-prefix-length pivot.
    ///
    /// Records whose key shares more than `cpl` leading bits with `local`
    /// move to the returned bucket; records at exactly `cpl` stay. Relative
    /// order is preserved on both sides.
    pub fn split(&mut self, cpl: usize, local: &Key) -> Bucket {
        let mut kept = VecDeque::with_capacity(self.list.len());
        let mut moved = VecDeque::new();
        for info in self.list.drain(..) {
            if info.key.common_prefix_len(local) > cpl {
                moved.push_back(info);
            } else {
                kept.push_back(info);
            }
        }
        self.list = kept;
        Bucket { list: moved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn create_info(id: PeerId) -> PeerInfo {
        PeerInfo::new(id, Some(SystemTime::now()))
    }

    #[test]
    fn test_empty_bucket() {
        let bucket = Bucket::new();
        assert!(bucket.is_empty());
        assert_eq!(bucket.len(), 0);
        assert!(bucket.peers().is_empty());
    }

    #[test]
    fn test_push_and_get() {
        let mut bucket = Bucket::new();
        let peers: Vec<PeerId> = (0..100).map(|_| PeerId::random()).collect();
        for p in &peers {
            bucket.push_front(create_info(p.clone()));
        }
        assert_eq!(bucket.len(), 100);

        let probe = &peers[37];
        let found = bucket.get_peer(probe).unwrap();
        assert_eq!(&found.id, probe);
        assert_eq!(found.key, Key::for_peer(probe));

        assert!(bucket.get_peer(&PeerId::random()).is_none());
    }

    #[test]
    fn test_mutate_record_in_place() {
        let mut bucket = Bucket::new();
        let p = PeerId::random();
        bucket.push_front(create_info(p.clone()));

        let later = SystemTime::now() + std::time::Duration::from_secs(3600);
        bucket.get_peer_mut(&p).unwrap().last_useful_outbound_query = Some(later);

        assert_eq!(
            bucket.get_peer(&p).unwrap().last_useful_outbound_query,
            Some(later)
        );
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut bucket = Bucket::new();
        let p = PeerId::random();
        bucket.push_front(create_info(p.clone()));

        assert!(bucket.remove(&p));
        assert!(!bucket.remove(&p));
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_move_to_front() {
        let mut bucket = Bucket::new();
        let peers: Vec<PeerId> = (0..5).map(|_| PeerId::random()).collect();
        for p in &peers {
            bucket.push_front(create_info(p.clone()));
        }

        // peers[0] was pushed first, so it sits at the back.
        bucket.move_to_front(&peers[0]);
        assert_eq!(bucket.peers()[0].id, peers[0]);
        assert_eq!(bucket.len(), 5);
    }

    #[test]
    fn test_min_by_keeps_first_tie() {
        let mut bucket = Bucket::new();
        let peers: Vec<PeerId> = (0..3).map(|_| PeerId::random()).collect();
        for p in &peers {
            bucket.push_front(create_info(p.clone()));
        }

        // Constant score: every entry ties, the head wins.
        let min = bucket.min_by(|_| 0u8).unwrap();
        assert_eq!(min.id, peers[2]);
    }

    #[test]
    fn test_split_partitions_by_cpl() {
        let local = Key::for_bytes(b"local");
        let mut bucket = Bucket::new();
        for _ in 0..100 {
            bucket.push_front(create_info(PeerId::random()));
        }
        let before = bucket.len();

        let moved = bucket.split(0, &local);
        assert_eq!(bucket.len() + moved.len(), before);

        for info in bucket.iter() {
            assert_eq!(info.key.common_prefix_len(&local), 0);
        }
        for info in moved.iter() {
            assert!(info.key.common_prefix_len(&local) > 0);
        }
    }

    #[test]
    fn test_split_preserves_order() {
        let local = Key::for_bytes(b"local");
        let mut bucket = Bucket::new();
        for _ in 0..50 {
            bucket.push_front(create_info(PeerId::random()));
        }
        let original: Vec<PeerId> = bucket.iter().map(|i| i.id.clone()).collect();

        let moved = bucket.split(0, &local);

        let mut merged = Vec::new();
        let mut kept_iter = bucket.iter().peekable();
        let mut moved_iter = moved.iter().peekable();
        for id in &original {
            if kept_iter.peek().map(|i| &i.id) == Some(id) {
                merged.push(kept_iter.next().unwrap().id.clone());
            } else {
                assert_eq!(moved_iter.peek().map(|i| &i.id), Some(id));
                merged.push(moved_iter.next().unwrap().id.clone());
            }
        }
        assert_eq!(merged, original);
    }
}
