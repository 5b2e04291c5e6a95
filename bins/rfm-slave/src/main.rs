use rfm_config::Config;
use rfm_core::{DataSourceOps, RfmDataSource, SignalId};
use rfm_driver::LoopbackDriver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config/rfm-slave/config.toml".to_string());
    let config = Config::load(&config_path, true)?;

    info!(device = %config.device, node_id = config.node_id, "RFM-SLAVE: attaching to card");
    let driver = LoopbackDriver::open(&config.device, config.node_id)?;

    let exec_mode = config.exec_mode;
    let ds = Arc::new(Mutex::new(RfmDataSource::new(config, Box::new(driver), true)));
    ds.lock().unwrap().enter_run()?;

    if exec_mode == rfm_config::ExecMode::Spawned {
        RfmDataSource::spawn_worker(&ds);
    }

    info!("RFM-SLAVE: waiting for master cycles");
    let mut last_log = Instant::now();
    let mut cycles: u64 = 0;
    let mut last_drift = 0.0f32;

    loop {
        let caught = RfmDataSource::synchronise_shared(&ds);
        if caught {
            cycles += 1;
            let guard = ds.lock().unwrap();
            let diagnostics = guard.get_signal_memory_buffer(SignalId::PeerDiagnostics);
            last_drift = f32::from_le_bytes(diagnostics[0..4].try_into().unwrap());
            if guard.is_exhausted() {
                info!(cycles, "RFM-SLAVE: cycle budget exhausted, stopping");
                break;
            }
        }

        if last_log.elapsed() >= Duration::from_secs(1) {
            info!(cycles, drift_vs_master = last_drift, "RFM-SLAVE: heartbeat");
            last_log = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    Ok(())
}
