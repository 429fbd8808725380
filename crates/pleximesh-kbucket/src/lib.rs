//! Pleximesh routing table
//!
//! A Kademlia-style routing table for DHT overlays:
//! - Peers organised by XOR distance from the local key
//! - Dynamically splitting buckets indexed by common prefix length
//! - Liveness-aware eviction gated on a usefulness TTL
//! - Ordered proximity queries merged across buckets

pub mod bucket;
pub mod error;
pub mod keyspace;
pub mod metrics;
pub mod peer_id;
pub mod peer_info;
pub mod routing_table;

pub use bucket::Bucket;
pub use error::{Result, TableError};
pub use keyspace::{sort_closest, Distance, Key, KEY_BITS, KEY_LEN};
pub use metrics::{EwmaLatency, LatencyOracle, NoopLatency};
pub use peer_id::PeerId;
pub use peer_info::PeerInfo;
pub use routing_table::{RoutingTable, MAX_GENERATED_CPL};

/// Default bucket capacity (the Kademlia k parameter).
pub const DEFAULT_BUCKET_SIZE: usize = 20;
