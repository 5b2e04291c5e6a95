//! Lifecycle (component H): the Run-entry publish/fetch/remap sequence and
//! the teardown drain, per §4.8.

use crate::error::RfmError;
use rfm_config::Config;
use rfm_driver::RfmDriver;
use rfm_proto::diag::build_diag_ratios;
use rfm_proto::sync::MasterStep;
use rfm_proto::{PeerLayout, PeerLayoutTable, ReadPlan};
use tracing::info;

/// Everything §4.8's "Idle→Run" transition computes once, before the first
/// cycle: the peer layout table, this host's read plan, and its diagnostic
/// ratios.
pub struct RunEntry {
    pub peers: PeerLayoutTable,
    pub plan: ReadPlan,
    pub diag_ratio: Vec<f32>,
}

/// Publishes this host's layout, fetches every peer's, contiguity-checks
/// them, builds the read plan, and computes diagnostic ratios. The master
/// additionally broadcasts `initRunTime` under a zeroed iteration.
pub fn enter_run(driver: &dyn RfmDriver, config: &Config) -> Result<RunEntry, RfmError> {
    let own = PeerLayout {
        write_offset: config.write_offset,
        output_size: config.output_size,
        downsample_factor: config.downsample_factor,
    };
    PeerLayoutTable::publish(driver, config.node_id, own)?;

    let peers = PeerLayoutTable::fetch(driver, config.n_hosts)?;
    peers.check_contiguity()?;

    let plan = ReadPlan::build(&peers, config.read_offset, config.input_size);

    let diag_ratio = build_diag_ratios(
        config.n_hosts as usize,
        plan.first_peer,
        plan.last_peer,
        |i| peers.get(i).map(|p| p.downsample_factor).unwrap_or(1),
        config.downsample_factor,
    );

    if config.is_master {
        MasterStep::publish(driver, 0, config.init_run_time);
        info!(init_run_time = config.init_run_time, "master broadcast initial run time");
    }

    Ok(RunEntry { peers, plan, diag_ratio })
}

/// Unmaps DMA (if it was mapped) and closes the driver handle, per §4.8's
/// teardown step.
pub fn teardown(driver: &mut dyn RfmDriver, dma_enabled: bool) -> Result<(), RfmError> {
    if dma_enabled {
        driver.unmap_dma()?;
    }
    driver.close()?;
    Ok(())
}
