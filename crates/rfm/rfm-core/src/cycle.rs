//! Per-cycle mutable state (§3 `CycleState`, `Diagnostics`), owned
//! exclusively by the cycle-driving component (the RT thread in Inline
//! mode, the worker thread in Spawned mode) per §5's ordering discipline.

/// Mutable state advanced once per RFM cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleState {
    pub local_cycle: u32,
    pub master_cycle: i32,
    pub local_counter: u32,
    pub own_cycle_counter: i32,
    pub real_time: f64,
    pub real_time_base_ticks: u64,
}

impl CycleState {
    pub fn new(start_cycle: i32) -> Self {
        Self {
            own_cycle_counter: start_cycle,
            ..Self::default()
        }
    }
}

/// Per-peer staleness bookkeeping, one slot per host indexed by `nodeId`.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub counter_read: Vec<i32>,
    pub diag_data: Vec<f32>,
    pub diag_ratio: Vec<f32>,
}

impl Diagnostics {
    pub fn new(n_hosts: usize) -> Self {
        Self {
            counter_read: vec![0; n_hosts],
            diag_data: vec![0.0; n_hosts],
            diag_ratio: vec![0.0; n_hosts],
        }
    }
}
