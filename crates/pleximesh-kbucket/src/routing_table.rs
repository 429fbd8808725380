//! Kademlia-style routing table.
//!
//! Peers are spread over a growing vector of buckets indexed by the common
//! prefix length between their key and the local key; the last bucket
//! captures every deeper prefix and is the only one that splits. One
//! reader-writer lock protects the whole vector. `peer_added` and
//! `peer_removed` observers run only after the lock is released.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::bucket::Bucket;
use crate::error::{Result, TableError};
use crate::keyspace::{Distance, Key, KEY_BITS};
use crate::metrics::LatencyOracle;
use crate::peer_id::PeerId;
use crate::peer_info::PeerInfo;

/// Highest common prefix length [`RoutingTable::gen_rand_peer_id`] can
/// target. Identifiers are found by rejection sampling against the key
/// hash, which costs `2^(cpl+1)` attempts on average.
pub const MAX_GENERATED_CPL: usize = 15;

type PeerCallback = Arc<dyn Fn(&PeerId) + Send + Sync>;

/// A bounded, XOR-organised view of known peers.
pub struct RoutingTable {
    /// Key of the owning peer, fixed at construction.
    local_key: Key,

    /// Maximum peers per bucket (the Kademlia k parameter).
    bucket_size: usize,

    /// Latency above which a peer is rejected when it would otherwise need
    /// to evict a healthy incumbent.
    latency_tolerance: Duration,

    /// Age beyond which a peer's last useful interaction makes it eligible
    /// for replacement.
    usefulness_ttl: Duration,

    /// Latency oracle consulted during eviction and rejection.
    metrics: Arc<dyn LatencyOracle>,

    /// `buckets[i]` holds peers at CPL `i` from the local key; the last
    /// bucket holds everything at its index and deeper.
    buckets: RwLock<Vec<Bucket>>,

    peer_added: RwLock<Option<PeerCallback>>,
    peer_removed: RwLock<Option<PeerCallback>>,
}

impl RoutingTable {
    /// Create a table with a single empty bucket.
    pub fn new(
        bucket_size: usize,
        local_key: Key,
        latency_tolerance: Duration,
        metrics: Arc<dyn LatencyOracle>,
        usefulness_ttl: Duration,
    ) -> Result<Self> {
        if bucket_size == 0 {
            return Err(TableError::InvalidBucketSize(bucket_size));
        }
        Ok(RoutingTable {
            local_key,
            bucket_size,
            latency_tolerance,
            usefulness_ttl,
            metrics,
            buckets: RwLock::new(vec![Bucket::new()]),
            peer_added: RwLock::new(None),
            peer_removed: RwLock::new(None),
        })
    }

    /// Key of the owning peer.
    pub fn local_key(&self) -> &Key {
        &self.local_key
    }

    /// Configured bucket capacity.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of buckets currently allocated. Diagnostic.
    pub fn num_buckets(&self) -> usize {
        self.buckets.read().len()
    }

    /// Register an observer for peer admissions. Runs outside the table
    /// lock, on the thread that performed the mutation.
    pub fn set_peer_added(&self, cb: impl Fn(&PeerId) + Send + Sync + 'static) {
        *self.peer_added.write() = Some(Arc::new(cb));
    }

    /// Register an observer for peer removals and evictions. Same
    /// discipline as [`RoutingTable::set_peer_added`].
    pub fn set_peer_removed(&self, cb: impl Fn(&PeerId) + Send + Sync + 'static) {
        *self.peer_removed.write() = Some(Arc::new(cb));
    }

    fn notify_added(&self, peer: &PeerId) {
        let cb = self.peer_added.read().clone();
        if let Some(cb) = cb {
            cb(peer);
        }
    }

    fn notify_removed(&self, peer: &PeerId) {
        let cb = self.peer_removed.read().clone();
        if let Some(cb) = cb {
            cb(peer);
        }
    }

    /// Index of the bucket responsible for `key`: its CPL with the local
    /// key, capped at the last bucket.
    fn bucket_index(buckets: &[Bucket], local: &Key, key: &Key) -> usize {
        local.common_prefix_len(key).min(buckets.len() - 1)
    }

    /// Split the last bucket, appending the deeper half; repeat while the
    /// freshly created bucket is itself over capacity. Terminates because
    /// the CPL of distinct keys is bounded by the key width.
    fn unfold_last_bucket(buckets: &mut Vec<Bucket>, local: &Key, bucket_size: usize) {
        loop {
            let last = buckets.len() - 1;
            let deeper = buckets[last].split(last, local);
            buckets.push(deeper);
            debug!("split bucket {}, table now has {} buckets", last, buckets.len());
            if buckets[buckets.len() - 1].len() < bucket_size || buckets.len() > KEY_BITS {
                break;
            }
        }
    }

    /// Offer a peer to the table.
    ///
    /// Returns `Ok(true)` if the peer was admitted, `Ok(false)` if it was
    /// already present (in which case a `query_peer` offer promotes a
    /// never-useful record to usefully-contacted-now), and an error when a
    /// full bucket has no replaceable incumbent.
    ///
    /// `query_peer` marks peers we have just completed a useful outbound
    /// query to, as opposed to peers we merely heard about.
    pub fn try_add_peer(&self, peer: &PeerId, query_peer: bool) -> Result<bool> {
        let key = Key::for_peer(peer);
        let now = SystemTime::now();
        let last_useful = if query_peer { Some(now) } else { None };

        let mut buckets = self.buckets.write();
        let mut idx = Self::bucket_index(&buckets, &self.local_key, &key);

        // Already present: no reordering, but a query offer records first
        // usefulness on a record that had none.
        if let Some(existing) = buckets[idx].get_peer_mut(peer) {
            if query_peer && existing.last_useful_outbound_query.is_none() {
                existing.last_useful_outbound_query = Some(now);
            }
            return Ok(false);
        }

        // A distinct identifier hashing onto an occupied key: the later
        // insertion wins in place.
        if let Some(colliding) = buckets[idx].get_peer_by_key_mut(&key) {
            let previous = std::mem::replace(&mut colliding.id, peer.clone());
            colliding.last_useful_outbound_query = last_useful;
            colliding.added_at = now;
            drop(buckets);
            debug!("peer {} displaced {} on key collision", peer, previous);
            self.notify_removed(&previous);
            self.notify_added(peer);
            return Ok(true);
        }

        if buckets[idx].len() < self.bucket_size {
            buckets[idx].push_front(PeerInfo {
                id: peer.clone(),
                key,
                last_useful_outbound_query: last_useful,
                added_at: now,
            });
            drop(buckets);
            debug!("peer {} added to bucket {}", peer, idx);
            self.notify_added(peer);
            return Ok(true);
        }

        // Destination full. Only the last bucket may split; doing so can
        // open room either in the new destination or in what remains of the
        // old last bucket.
        if idx == buckets.len() - 1 {
            Self::unfold_last_bucket(&mut buckets, &self.local_key, self.bucket_size);
            idx = Self::bucket_index(&buckets, &self.local_key, &key);
            if buckets[idx].len() < self.bucket_size {
                buckets[idx].push_front(PeerInfo {
                    id: peer.clone(),
                    key,
                    last_useful_outbound_query: last_useful,
                    added_at: now,
                });
                drop(buckets);
                debug!("peer {} added to bucket {} after split", peer, idx);
                self.notify_added(peer);
                return Ok(true);
            }
        }

        // Replace the incumbent whose usefulness record is oldest, if any
        // is past the TTL. Ties fall to the lower-latency peer, then to
        // position.
        let replaceable = buckets[idx]
            .iter()
            .filter(|info| info.is_stale(self.usefulness_ttl, now))
            .min_by(|a, b| {
                a.last_useful_outbound_query
                    .cmp(&b.last_useful_outbound_query)
                    .then_with(|| self.metrics.latency(&a.id).cmp(&self.metrics.latency(&b.id)))
            })
            .map(|info| info.id.clone());

        if let Some(stale) = replaceable {
            buckets[idx].remove(&stale);
            buckets[idx].push_front(PeerInfo {
                id: peer.clone(),
                key,
                last_useful_outbound_query: last_useful,
                added_at: now,
            });
            drop(buckets);
            debug!("peer {} replaced stale peer {} in bucket {}", peer, stale, idx);
            self.notify_removed(&stale);
            self.notify_added(peer);
            return Ok(true);
        }

        drop(buckets);
        if self.metrics.latency(peer) > self.latency_tolerance {
            debug!("peer {} rejected: latency above tolerance", peer);
            Err(TableError::PeerRejectedHighLatency)
        } else {
            debug!("peer {} rejected: bucket {} full", peer, idx);
            Err(TableError::PeerRejectedNoCapacity)
        }
    }

    /// Remove a peer if present. Removing an absent peer is a no-op.
    pub fn remove_peer(&self, peer: &PeerId) {
        let key = Key::for_peer(peer);
        let removed = {
            let mut buckets = self.buckets.write();
            let idx = Self::bucket_index(&buckets, &self.local_key, &key);
            buckets[idx].remove(peer)
        };
        if removed {
            debug!("peer {} removed from routing table", peer);
            self.notify_removed(peer);
        }
    }

    /// Overwrite the peer's last-useful-query timestamp. Returns whether
    /// the peer was found. Does not reorder buckets.
    pub fn update_last_successful_outbound_query(&self, peer: &PeerId, at: SystemTime) -> bool {
        let key = Key::for_peer(peer);
        let mut buckets = self.buckets.write();
        let idx = Self::bucket_index(&buckets, &self.local_key, &key);
        match buckets[idx].get_peer_mut(peer) {
            Some(info) => {
                info.last_useful_outbound_query = Some(at);
                true
            }
            None => false,
        }
    }

    /// Look a peer up by identifier.
    pub fn find(&self, peer: &PeerId) -> Option<PeerId> {
        let key = Key::for_peer(peer);
        let buckets = self.buckets.read();
        let idx = Self::bucket_index(&buckets, &self.local_key, &key);
        buckets[idx].get_peer(peer).map(|info| info.id.clone())
    }

    /// Snapshot of a peer's stored record, if present.
    pub fn peer_info(&self, peer: &PeerId) -> Option<PeerInfo> {
        let key = Key::for_peer(peer);
        let buckets = self.buckets.read();
        let idx = Self::bucket_index(&buckets, &self.local_key, &key);
        buckets[idx].get_peer(peer).cloned()
    }

    /// The single closest known peer to `target`, if the table is
    /// non-empty.
    pub fn nearest_peer(&self, target: &Key) -> Option<PeerId> {
        self.nearest_peers(target, 1).into_iter().next()
    }

    /// Up to `count` known peers, sorted by ascending XOR distance to
    /// `target`.
    ///
    /// Candidates come from the bucket matching the target's CPL first,
    /// then from deeper buckets, then from shallower ones; the bucket
    /// matching the CPL holds the closest peers the table can know about,
    /// so whenever the result is short only genuinely-farther peers are
    /// missing.
    pub fn nearest_peers(&self, target: &Key, count: usize) -> Vec<PeerId> {
        let buckets = self.buckets.read();
        let cpl = Self::bucket_index(&buckets, &self.local_key, target);

        let mut candidates: Vec<(Distance, PeerId)> = Vec::new();
        let absorb = |bucket: &Bucket, candidates: &mut Vec<_>| {
            for info in bucket.iter() {
                candidates.push((info.key.distance(target), info.id.clone()));
            }
        };

        absorb(&buckets[cpl], &mut candidates);
        if candidates.len() < count {
            for bucket in buckets.iter().skip(cpl + 1) {
                absorb(bucket, &mut candidates);
            }
        }
        if candidates.len() < count {
            for bucket in buckets.iter().take(cpl).rev() {
                absorb(bucket, &mut candidates);
            }
        }
        drop(buckets);

        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        candidates.truncate(count);
        candidates.into_iter().map(|(_, id)| id).collect()
    }

    /// Snapshot of every peer across all buckets: bucket order,
    /// head-first within a bucket.
    pub fn list_peers(&self) -> Vec<PeerId> {
        let buckets = self.buckets.read();
        buckets
            .iter()
            .flat_map(|b| b.iter().map(|info| info.id.clone()))
            .collect()
    }

    /// Total number of peers in the table.
    pub fn size(&self) -> usize {
        let buckets = self.buckets.read();
        buckets.iter().map(Bucket::len).sum()
    }

    /// Render the bucket structure for diagnostics. No stability contract.
    pub fn dump(&self) -> String {
        let now = SystemTime::now();
        let buckets = self.buckets.read();
        let mut out = String::new();
        let total: usize = buckets.iter().map(Bucket::len).sum();
        let _ = writeln!(
            out,
            "routing table: {} peers in {} buckets (bucket size {})",
            total,
            buckets.len(),
            self.bucket_size,
        );
        for (i, bucket) in buckets.iter().enumerate() {
            let _ = writeln!(out, "  bucket {} ({} peers)", i, bucket.len());
            for info in bucket.iter() {
                let age = now
                    .duration_since(info.added_at)
                    .unwrap_or(Duration::ZERO)
                    .as_secs();
                let useful = match info.last_useful_outbound_query {
                    Some(at) => {
                        let since = now.duration_since(at).unwrap_or(Duration::ZERO).as_secs();
                        format!("last useful {}s ago", since)
                    }
                    None => "never useful".to_string(),
                };
                let _ = writeln!(out, "    {} added {}s ago, {}", info.id, age, useful);
            }
        }
        out
    }

    /// Log the bucket structure. Diagnostic only.
    pub fn print(&self) {
        info!("{}", self.dump());
    }

    /// Generate a peer identifier whose key shares exactly `cpl` leading
    /// bits with the local key. Testing and refresh support.
    pub fn gen_rand_peer_id(&self, cpl: usize) -> Result<PeerId> {
        if cpl > MAX_GENERATED_CPL {
            return Err(TableError::CplOutOfRange {
                cpl,
                max: MAX_GENERATED_CPL,
            });
        }
        loop {
            let id = PeerId::random();
            if Key::for_peer(&id).common_prefix_len(&self.local_key) == cpl {
                return Ok(id);
            }
        }
    }
}
