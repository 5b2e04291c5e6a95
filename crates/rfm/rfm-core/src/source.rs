//! `RfmDataSource`: the capability composition described in SPEC_FULL.md
//! §9 — a single struct implementing [`DataSourceOps`] plus an `Execute`
//! callback, standing in for the original's inheritance from a data-source
//! base class, a message target, and a thread-callback interface.

use crate::broker::{broker_copy, select_brokers, BrokerKind};
use crate::cycle::{CycleState, Diagnostics};
use crate::error::RfmError;
use crate::io::BufferedIo;
use crate::lifecycle::{enter_run, teardown, RunEntry};
use crate::orchestrator::{ExecOutcome, RtOrchestrator};
use rfm_config::Config;
use rfm_driver::{RfmDriver, RwGlobal};
use rfm_proto::diag::{self, MASTER_PROBE_FAILED_SENTINEL};
use rfm_proto::sync::{self, MasterStep};
use rfm_proto::{PeerLayoutTable, ReadPlan};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One of the byte-slice views exposed to the host framework, in the
/// declared order from §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalId {
    OwnCycleCounter,
    OwnTime,
    Input,
    Output,
    RealTime,
    PeerCounters,
    PeerDiagnostics,
}

/// Which direction a broker's `get_broker_name` query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Capability set a host framework drives a data source through: memory
/// allocation, signal views, broker naming, the cycle-entry hook, and the
/// state-transition hook.
pub trait DataSourceOps {
    fn get_signal_memory_buffer(&self, signal: SignalId) -> &[u8];
    fn get_signal_memory_buffer_mut(&mut self, signal: SignalId) -> &mut [u8];
    fn get_broker_name(&self, direction: Direction) -> &'static str;
    fn synchronise(&mut self) -> bool;
    fn prepare_next_state(&mut self) -> Result<(), RfmError>;
}

pub struct RfmDataSource {
    config: Config,
    driver: Box<dyn RfmDriver>,
    _registry: RwGlobal,

    peers: PeerLayoutTable,
    plan: ReadPlan,
    cycle: CycleState,
    diag: Diagnostics,
    io: BufferedIo,
    orchestrator: RtOrchestrator,

    /// Guards `io`'s external buffers against concurrent compute-thread /
    /// worker-thread access, per §4.9.
    rw: Mutex<()>,
    input_broker: BrokerKind,
    output_broker: BrokerKind,

    own_cycle_counter_buf: [u8; 4],
    own_time_buf: [u8; 4],
    real_time_buf: [u8; 8],
    peer_counters_buf: Vec<u8>,
    peer_diagnostics_buf: Vec<u8>,
}

impl RfmDataSource {
    /// §4.8 "Init": allocate buffers, attach the process-wide registry.
    /// Peer layouts, the read plan, and diagnostic ratios are left empty
    /// until [`Self::enter_run`].
    pub fn new(config: Config, driver: Box<dyn RfmDriver>, sync_signal_present: bool) -> Self {
        let n_hosts = config.n_hosts as usize;
        let io = BufferedIo::new(config.input_size, config.output_size, config.n_hosts);
        let orchestrator = RtOrchestrator::new(config.exec_mode, config.cycle_budget);
        let (input_broker, output_broker) = select_brokers(config.is_master, sync_signal_present);

        Self {
            peers: PeerLayoutTable::from_peers(Vec::new()),
            plan: ReadPlan::empty(n_hosts),
            cycle: CycleState::new(config.start_cycle),
            diag: Diagnostics::new(n_hosts),
            io,
            orchestrator,
            rw: Mutex::new(()),
            input_broker,
            output_broker,
            own_cycle_counter_buf: [0; 4],
            own_time_buf: [0; 4],
            real_time_buf: [0; 8],
            peer_counters_buf: vec![0u8; 4 * n_hosts],
            peer_diagnostics_buf: vec![0u8; 4 * n_hosts],
            config,
            driver,
            _registry: RwGlobal::attach(),
        }
    }

    /// §4.8 "Idle→Run": publish/fetch/remap, compute diagnostic ratios,
    /// start the worker thread if Spawned.
    pub fn enter_run(&mut self) -> Result<(), RfmError> {
        let RunEntry { peers, plan, diag_ratio } = enter_run(self.driver.as_ref(), &self.config)?;
        self.peers = peers;
        self.plan = plan;
        self.diag.diag_ratio = diag_ratio;
        self.cycle = CycleState::new(self.config.start_cycle);
        self.cycle.real_time_base_ticks = now_ticks();
        self.refresh_signal_buffers();
        Ok(())
    }

    /// §4.8 "Run→Idle": stop the worker thread (no-op under Inline).
    pub fn leave_run(&mut self) {
        self.orchestrator.stop();
    }

    /// §4.8 "Teardown": unmap DMA, close the driver. Consumes `self`.
    pub fn teardown(mut self) -> Result<(), RfmError> {
        teardown(self.driver.as_mut(), self.config.dma_enabled)
    }

    pub fn is_exhausted(&self) -> bool {
        self.orchestrator.is_exhausted()
    }

    /// Starts the Spawned-mode worker thread for a data source already
    /// shared behind an `Arc<Mutex<_>>`. The worker repeatedly locks `ds`
    /// for the duration of one `execute` call — brief compared to a cycle
    /// period — and the orchestrator signals the cycle semaphore on every
    /// caught cycle, matching §4.6's Spawned semantics.
    pub fn spawn_worker(ds: &Arc<Mutex<Self>>) {
        let worker_ds = ds.clone();
        let mut guard = ds.lock().unwrap_or_else(|p| p.into_inner());
        guard.orchestrator.start_spawned(move || {
            let mut guard = worker_ds.lock().unwrap_or_else(|p| p.into_inner());
            guard.execute()
        });
    }

    /// [`DataSourceOps::synchronise`] for a data source shared behind
    /// `Arc<Mutex<_>>`, the arrangement [`Self::spawn_worker`] requires.
    /// Inline mode runs under the lock directly, same as the trait method —
    /// it never blocks on another lock holder. Spawned mode must not: its
    /// wait blocks on the cycle semaphore the worker thread signals from
    /// inside a call that needs this same lock to run `execute`, so the
    /// lock is dropped before waiting (`DataSourceOps::synchronise`'s
    /// Spawned branch, called while a caller still holds this lock, would
    /// deadlock the worker out of ever acquiring it).
    pub fn synchronise_shared(ds: &Arc<Mutex<Self>>) -> bool {
        let mut guard = ds.lock().unwrap_or_else(|p| p.into_inner());
        if guard.config.exec_mode == rfm_config::ExecMode::Spawned {
            let waiter = guard.orchestrator.cycle_waiter();
            drop(guard);
            waiter.wait()
        } else {
            guard.synchronise()
        }
    }

    /// One `Execute` pass (§4.4, §4.5, §4.7 tied together): master publishes
    /// `(iteration, time)` with retry and a diagnostic self-probe on
    /// exhaustion; a slave polls, reads its plan, evaluates diagnostics, and
    /// writes its own output.
    pub fn execute(&mut self) -> ExecOutcome {
        let outcome = if self.config.is_master {
            self.execute_master()
        } else {
            self.execute_slave()
        };
        if outcome == ExecOutcome::Caught {
            self.refresh_signal_buffers();
        }
        outcome
    }

    fn execute_master(&mut self) -> ExecOutcome {
        self.cycle.local_cycle += 1;
        self.cycle.own_cycle_counter += 1;
        self.cycle.real_time = ticks_to_seconds(now_ticks() - self.cycle.real_time_base_ticks);

        let driver = self.driver.as_ref();
        let cycle = &mut self.cycle;
        let diag = &mut self.diag;
        let io = &mut self.io;
        let config = &self.config;

        // §5: the driver is not re-entrant, so the whole publish/probe/write
        // sequence for this cycle runs under the process-wide registry lock.
        self._registry.with_lock(|| {
            let max_retries = config.master_step_max_retries.max(0) as u16;
            let (ok, retries) = MasterStep::publish_with_retries(driver, cycle.own_cycle_counter, cycle.real_time as i32, max_retries);

            if ok {
                diag.diag_data[0] = 0.0;
            } else {
                warn!(retries, "master step exhausted its retry budget");
                diag.diag_data[0] = match sync::try_read_iteration(driver) {
                    Some(observed) => (cycle.own_cycle_counter - observed) as f32,
                    None => MASTER_PROBE_FAILED_SENTINEL,
                };
            }

            let _ = io.write_cycle(driver, config.write_offset, config.node_id, cycle.own_cycle_counter);
        });

        ExecOutcome::Caught
    }

    fn execute_slave(&mut self) -> ExecOutcome {
        let driver = self.driver.as_ref();
        let cycle = &mut self.cycle;
        let diag = &mut self.diag;
        let io = &mut self.io;
        let config = &self.config;
        let plan = &self.plan;
        let orchestrator = &self.orchestrator;

        // §5: poll, bulk read, and write all touch the card, so the whole
        // per-cycle driver sequence runs under the process-wide registry
        // lock, same as the master's.
        self._registry.with_lock(|| {
            let Some(master_iteration) = sync::poll_iteration_until(driver, config.timeout) else {
                return ExecOutcome::Skipped;
            };
            cycle.master_cycle = master_iteration;

            if master_iteration.rem_euclid(config.downsample_factor as i32) != 0 {
                return ExecOutcome::Skipped;
            }

            cycle.own_cycle_counter += 1;
            cycle.real_time = ticks_to_seconds(now_ticks() - cycle.real_time_base_ticks);
            orchestrator.check_cycle_budget(cycle.own_cycle_counter);

            let _ = io.read_cycle(driver, plan, &mut diag.counter_read);
            diag::evaluate(
                cycle.own_cycle_counter,
                plan.first_peer,
                plan.last_peer,
                &diag.diag_ratio,
                &diag.counter_read,
                &mut diag.diag_data,
            );

            let _ = io.write_cycle(driver, config.write_offset, config.node_id, cycle.own_cycle_counter);
            ExecOutcome::Caught
        })
    }

    fn refresh_signal_buffers(&mut self) {
        self.own_cycle_counter_buf = self.cycle.own_cycle_counter.to_le_bytes();
        self.own_time_buf = self.cycle.master_cycle.to_le_bytes();
        self.real_time_buf = self.cycle.real_time.to_le_bytes();

        for (i, v) in self.diag.counter_read.iter().enumerate() {
            self.peer_counters_buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        for (i, v) in self.diag.diag_data.iter().enumerate() {
            self.peer_diagnostics_buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }
}

impl DataSourceOps for RfmDataSource {
    fn get_signal_memory_buffer(&self, signal: SignalId) -> &[u8] {
        match signal {
            SignalId::OwnCycleCounter => &self.own_cycle_counter_buf,
            SignalId::OwnTime => &self.own_time_buf,
            SignalId::Input => self.io.external_in(),
            SignalId::Output => self.io.external_out(),
            SignalId::RealTime => &self.real_time_buf,
            SignalId::PeerCounters => &self.peer_counters_buf,
            SignalId::PeerDiagnostics => &self.peer_diagnostics_buf,
        }
    }

    fn get_signal_memory_buffer_mut(&mut self, signal: SignalId) -> &mut [u8] {
        match signal {
            SignalId::OwnCycleCounter => &mut self.own_cycle_counter_buf,
            SignalId::OwnTime => &mut self.own_time_buf,
            SignalId::Input => self.io.external_in_mut(),
            SignalId::Output => self.io.external_out_mut(),
            SignalId::RealTime => &mut self.real_time_buf,
            SignalId::PeerCounters => &mut self.peer_counters_buf,
            SignalId::PeerDiagnostics => &mut self.peer_diagnostics_buf,
        }
    }

    fn get_broker_name(&self, direction: Direction) -> &'static str {
        let kind = match direction {
            Direction::Input => self.input_broker,
            Direction::Output => self.output_broker,
        };
        match kind {
            BrokerKind::Plain => "PlainBroker",
            BrokerKind::Synchronised => "SyncBroker",
            BrokerKind::Async => "AsyncBroker",
        }
    }

    /// Compute-thread entry point. Inline: the master runs `execute` exactly
    /// once; a slave loops it until a downsampled cycle is caught. Spawned:
    /// waits on the cycle semaphore the worker thread signals. Either way,
    /// the external buffers are exchanged with the internal ones under the
    /// broker selected for this host at Run entry.
    ///
    /// Callers sharing this data source behind `Arc<Mutex<_>>` with
    /// [`RfmDataSource::spawn_worker`] (the Spawned-mode arrangement) must
    /// call [`RfmDataSource::synchronise_shared`] instead of locking and
    /// calling this method directly: this method's Spawned branch blocks on
    /// the cycle semaphore for as long as `&mut self` is borrowed, and the
    /// worker thread needs that same lock to run `execute`.
    fn synchronise(&mut self) -> bool {
        match self.config.exec_mode {
            rfm_config::ExecMode::Inline if self.config.is_master => self.execute() == ExecOutcome::Caught,
            rfm_config::ExecMode::Inline => loop {
                if self.execute() == ExecOutcome::Caught {
                    break true;
                }
            },
            rfm_config::ExecMode::Spawned => self.orchestrator.synchronise_spawned(),
        }
    }

    fn prepare_next_state(&mut self) -> Result<(), RfmError> {
        self.enter_run()
    }
}

/// Copies `external` into `internal` (or vice versa) through the broker
/// selected for `direction`, serialised against `ds`'s shared mutex. Exposed
/// as a free function since the broker's own `Init` only needs a pointer to
/// the mutex, per §4.9.
pub fn broker_exchange(ds: &RfmDataSource, direction: Direction, dst: &mut [u8], src: &[u8]) -> bool {
    let kind = match direction {
        Direction::Input => ds.input_broker,
        Direction::Output => ds.output_broker,
    };
    broker_copy(kind, &ds.rw, dst, src)
}

/// Monotonic nanosecond tick source standing in for the original's
/// `HighResolutionTimer::Counter()`.
fn now_ticks() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}

fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / 1_000_000_000.0
}
