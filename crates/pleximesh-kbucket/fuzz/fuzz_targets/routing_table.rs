#![no_main]

use std::sync::Arc;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use pleximesh_kbucket::{Key, NoopLatency, PeerId, RoutingTable};

fuzz_target!(|data: &[u8]| {
    // Routing table operations must not panic on arbitrary identifiers.
    let local_key = Key::for_bytes(b"fuzz-local");
    let rt = match RoutingTable::new(
        4,
        local_key,
        Duration::from_secs(60 * 60),
        Arc::new(NoopLatency),
        Duration::from_secs(24 * 60 * 60),
    ) {
        Ok(rt) => rt,
        Err(_) => return,
    };

    // Feed arbitrary byte chunks through the admission path.
    for chunk in data.chunks(8) {
        let peer = PeerId::new(chunk.to_vec());
        let query_peer = chunk.first().map_or(false, |b| b & 1 == 1);
        let _ = rt.try_add_peer(&peer, query_peer);
    }

    // Lookups on arbitrary data must stay consistent.
    if !data.is_empty() {
        let probe = PeerId::new(data.to_vec());
        let _ = rt.find(&probe);
        let _ = rt.nearest_peers(&Key::for_bytes(data), 3);
        rt.remove_peer(&probe);
        rt.remove_peer(&probe);
    }

    assert_eq!(rt.size(), rt.list_peers().len());
});
