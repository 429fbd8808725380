//! Routing table error types.

use thiserror::Error;

/// Errors surfaced by routing table operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The destination bucket is full and no incumbent is eligible for
    /// replacement.
    #[error("peer rejected: no capacity in destination bucket")]
    PeerRejectedNoCapacity,

    /// The latency oracle reports an estimate above the configured
    /// tolerance for the candidate peer.
    #[error("peer rejected: estimated latency above tolerance")]
    PeerRejectedHighLatency,

    /// The table was constructed with a zero bucket capacity.
    #[error("bucket size must be positive, got {0}")]
    InvalidBucketSize(usize),

    /// A peer id was requested for a common prefix length the generator
    /// cannot reach.
    #[error("cannot generate a peer id for cpl {cpl} (max {max})")]
    CplOutOfRange { cpl: usize, max: usize },
}

/// Result type for routing table operations.
pub type Result<T> = std::result::Result<T, TableError>;
