//! Peer latency estimation.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::peer_id::PeerId;

/// Caller-supplied oracle estimating round-trip latency to a peer.
///
/// The routing table consults the oracle when it has to break ties during
/// eviction and when classifying an admission rejection. Implementations may
/// return a default for peers they have no measurement for.
pub trait LatencyOracle: Send + Sync {
    /// Estimated round-trip latency for `peer`.
    fn latency(&self, peer: &PeerId) -> Duration;
}

/// Smoothing factor applied to new samples in [`EwmaLatency`].
const EWMA_SMOOTHING: f64 = 0.1;

/// Exponentially weighted moving average of observed round-trip times.
///
/// The first sample for a peer is taken as-is; each further sample shifts
/// the estimate by [`EWMA_SMOOTHING`] of the difference.
#[derive(Default)]
pub struct EwmaLatency {
    estimates: RwLock<HashMap<PeerId, Duration>>,
}

impl EwmaLatency {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new round-trip observation into the estimate for `peer`.
    pub fn record_latency(&self, peer: &PeerId, sample: Duration) {
        let mut estimates = self.estimates.write();
        match estimates.get_mut(peer) {
            Some(estimate) => {
                let smoothed = estimate.as_secs_f64() * (1.0 - EWMA_SMOOTHING)
                    + sample.as_secs_f64() * EWMA_SMOOTHING;
                *estimate = Duration::from_secs_f64(smoothed);
            }
            None => {
                estimates.insert(peer.clone(), sample);
            }
        }
    }
}

impl LatencyOracle for EwmaLatency {
    fn latency(&self, peer: &PeerId) -> Duration {
        self.estimates
            .read()
            .get(peer)
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Oracle reporting no latency information for any peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLatency;

impl LatencyOracle for NoopLatency {
    fn latency(&self, _peer: &PeerId) -> Duration {
        Duration::ZERO
    }
}
