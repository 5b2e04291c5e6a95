//! Diagnostic engine (component E): per-peer staleness metric derived from
//! the interleaved cycle counters the remap planner extracts every cycle.

/// Sentinel written to `diagData[0]` when the master's retry budget was
/// exhausted *and* the fallback iteration probe also failed.
pub const MASTER_PROBE_FAILED_SENTINEL: f32 = -12345.0;

/// `diagRatio[i] = peerDSF[i] / ownDSF`, computed once before Run for every
/// peer this host actually reads.
pub fn diag_ratio(peer_dsf: u32, own_dsf: u32) -> f32 {
    peer_dsf as f32 / own_dsf as f32
}

/// `diagData[i] = ownCounter − diagRatio[i] · counterRead[i]`.
///
/// Positive: peer `i`'s data is older than its downsample ratio allows
/// (stale). Negative: this host is behind peer `i`.
pub fn diag_data(own_counter: i32, ratio: f32, peer_counter: i32) -> f32 {
    own_counter as f32 - ratio * peer_counter as f32
}

/// Computes `diagRatio` for every peer in `first_peer..=last_peer`,
/// indexed by nodeId (unused slots left at `0.0`).
pub fn build_diag_ratios(n_hosts: usize, first_peer: i32, last_peer: i32, peer_dsf: impl Fn(u32) -> u32, own_dsf: u32) -> Vec<f32> {
    let mut ratios = vec![0.0f32; n_hosts];
    if first_peer == -1 {
        return ratios;
    }
    for i in first_peer..=last_peer {
        ratios[i as usize] = diag_ratio(peer_dsf(i as u32), own_dsf);
    }
    ratios
}

/// Recomputes `diagData` for every covered peer from freshly scattered
/// counters.
pub fn evaluate(own_counter: i32, first_peer: i32, last_peer: i32, ratios: &[f32], counter_read: &[i32], diag_data_out: &mut [f32]) {
    if first_peer == -1 {
        return;
    }
    for i in first_peer..=last_peer {
        let idx = i as usize;
        diag_data_out[idx] = diag_data(own_counter, ratios[idx], counter_read[idx]);
    }
}
