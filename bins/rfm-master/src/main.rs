use rfm_config::Config;
use rfm_core::RfmDataSource;
use rfm_driver::LoopbackDriver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Size of the loopback "card" file this demo creates. A real RFM card is
/// fixed by the installed hardware; the loopback transport just needs
/// enough room for the system header plus every configured host's slice.
const CARD_REGION_LEN: u64 = 1 << 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config/rfm-master/config.toml".to_string());
    let config = Config::load(&config_path, true)?;

    info!(device = %config.device, node_id = config.node_id, "RFM-MASTER: opening card");
    let driver = LoopbackDriver::create(&config.device, config.node_id, CARD_REGION_LEN)?;

    let exec_mode = config.exec_mode;
    let ds = Arc::new(Mutex::new(RfmDataSource::new(config, Box::new(driver), true)));
    ds.lock().unwrap().enter_run()?;

    if exec_mode == rfm_config::ExecMode::Spawned {
        RfmDataSource::spawn_worker(&ds);
    }

    info!("RFM-MASTER: publishing (iteration, time) every cycle");
    let mut last_log = Instant::now();
    let mut cycles: u64 = 0;

    loop {
        let caught = RfmDataSource::synchronise_shared(&ds);
        if caught {
            cycles += 1;
        }

        if last_log.elapsed() >= Duration::from_secs(1) {
            info!(cycles, "RFM-MASTER: heartbeat");
            last_log = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}
