//! `rfm-config`: loads and validates the configuration for one RFM data
//! source.
//!
//! [`RfmSourceConfig`] is the raw, mostly-defaulted shape deserialised
//! straight off a TOML document (§6 "Configuration"); [`Config`] is the
//! frozen, range-checked form the rest of the workspace actually runs
//! against. Splitting the two means a malformed file (`ConfigError`) and a
//! well-formed-but-semantically-invalid one (`ValidationError`) are
//! distinguishable to callers.

use rfm_proto::SYSTEM_BUFFER;
use serde::Deserialize;
use std::path::Path;

/// `ExecutionMode` (§4.6): inline on the calling real-time thread, or an
/// independent worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Inline,
    Spawned,
}

/// Raw, TOML-deserialisable configuration document. Every field that has a
/// sensible default in the original system carries one here; fields with no
/// meaningful default (`node_id`, offsets, sizes, `n_hosts`) are mandatory.
#[derive(Debug, Deserialize)]
pub struct RfmSourceConfig {
    #[serde(default = "defaults::exec_mode")]
    pub execution_mode: ExecMode,
    #[serde(default)]
    pub cpu_mask: u32,
    #[serde(default = "defaults::stack_size")]
    pub stack_size: u32,
    pub device: String,

    pub read_offset: u32,
    pub write_offset: u32,
    pub input_size: u32,
    pub output_size: u32,

    #[serde(default)]
    pub use_dma: bool,
    #[serde(default)]
    pub dma_buffer_address: u64,
    #[serde(default = "defaults::wait_dma")]
    pub wait_dma: bool,
    #[serde(default)]
    pub dma_buffer_size: u32,
    #[serde(default)]
    pub dma_threshold: u32,

    #[serde(default = "defaults::downsample_factor")]
    pub downsample_factor: u32,
    #[serde(default)]
    pub start_cycle: i32,

    #[serde(default)]
    pub master: bool,
    #[serde(default)]
    pub init_run_time: i32,
    #[serde(default = "defaults::master_step_max_retries")]
    pub master_step_max_retries: i16,

    pub number_of_hosts: u32,
    #[serde(default = "defaults::timeout_us")]
    pub timeout_us: f64,
    pub node_id_number: u32,

    /// Slave-only: stop advancing once `ownCycleCounter + 1 > cycles`.
    pub cycles: Option<i32>,
}

mod defaults {
    use super::ExecMode;

    pub fn exec_mode() -> ExecMode {
        ExecMode::Spawned
    }

    pub fn stack_size() -> u32 {
        128 * 1024
    }

    pub fn wait_dma() -> bool {
        true
    }

    pub fn downsample_factor() -> u32 {
        1
    }

    pub fn master_step_max_retries() -> i16 {
        100
    }

    pub fn timeout_us() -> f64 {
        1_000_000.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("readOffset {0} must be >= SYSTEM_BUFFER ({SYSTEM_BUFFER})")]
    ReadOffsetTooLow(u32),
    #[error("writeOffset {0} must be >= SYSTEM_BUFFER ({SYSTEM_BUFFER})")]
    WriteOffsetTooLow(u32),
    #[error("nodeIdNumber must be 0 iff Master is true (master={master}, node_id={node_id})")]
    MasterNodeIdMismatch { master: bool, node_id: u32 },
    #[error("nodeIdNumber {node_id} must be in [1, {n_hosts})")]
    SlaveNodeIdOutOfRange { node_id: u32, n_hosts: u32 },
    #[error("downSampleFactor must be >= 1, got {0}")]
    DownsampleFactorZero(u32),
    #[error("DMA input_size {input_size} exceeds half of dma_buffer_size {dma_buffer_size}")]
    DmaInputTooLarge { input_size: u32, dma_buffer_size: u32 },
    #[error("DMA output_size {output_size} exceeds half of dma_buffer_size {dma_buffer_size}")]
    DmaOutputTooLarge { output_size: u32, dma_buffer_size: u32 },
    #[error("device path must be <= 40 bytes, got {0}")]
    DeviceNameTooLong(usize),
    #[error("non-master, non-synchronising operation is only valid under Spawned execution mode")]
    NonSyncRequiresSpawned,
}

/// Frozen, validated configuration. Immutable for the lifetime of the data
/// source once built.
#[derive(Debug, Clone)]
pub struct Config {
    pub node_id: u32,
    pub n_hosts: u32,
    pub is_master: bool,
    pub device: String,
    pub cpu_mask: u32,
    pub stack_size: u32,

    pub read_offset: u32,
    pub write_offset: u32,
    pub input_size: u32,
    pub output_size: u32,

    pub downsample_factor: u32,
    pub start_cycle: i32,
    pub cycle_budget: Option<i32>,

    pub timeout: std::time::Duration,
    pub init_run_time: i32,
    pub master_step_max_retries: i16,

    pub dma_enabled: bool,
    pub dma_await: bool,
    pub dma_threshold: u32,
    pub dma_buffer_size: u32,
    pub dma_buffer_phys_addr: u64,

    pub exec_mode: ExecMode,
}

impl Config {
    /// Loads and parses `path`, then validates it into a frozen [`Config`].
    pub fn load(path: impl AsRef<Path>, synchronising: bool) -> Result<Self, RfmError> {
        let raw = RfmSourceConfig::load(path)?;
        Ok(Self::from_raw(raw, synchronising)?)
    }

    /// Validates an already-parsed [`RfmSourceConfig`], per §3's invariants
    /// and §6's enumerated ranges.
    pub fn from_raw(raw: RfmSourceConfig, synchronising: bool) -> Result<Self, ValidationError> {
        if raw.read_offset < SYSTEM_BUFFER {
            return Err(ValidationError::ReadOffsetTooLow(raw.read_offset));
        }
        if raw.write_offset < SYSTEM_BUFFER {
            return Err(ValidationError::WriteOffsetTooLow(raw.write_offset));
        }
        if raw.master != (raw.node_id_number == 0) {
            return Err(ValidationError::MasterNodeIdMismatch {
                master: raw.master,
                node_id: raw.node_id_number,
            });
        }
        if !raw.master && !(1..raw.number_of_hosts).contains(&raw.node_id_number) {
            return Err(ValidationError::SlaveNodeIdOutOfRange {
                node_id: raw.node_id_number,
                n_hosts: raw.number_of_hosts,
            });
        }
        if raw.downsample_factor < 1 {
            return Err(ValidationError::DownsampleFactorZero(raw.downsample_factor));
        }
        if raw.device.len() > 40 {
            return Err(ValidationError::DeviceNameTooLong(raw.device.len()));
        }
        if raw.use_dma {
            if raw.input_size > raw.dma_buffer_size / 2 {
                return Err(ValidationError::DmaInputTooLarge {
                    input_size: raw.input_size,
                    dma_buffer_size: raw.dma_buffer_size,
                });
            }
            if raw.output_size > raw.dma_buffer_size / 2 {
                return Err(ValidationError::DmaOutputTooLarge {
                    output_size: raw.output_size,
                    dma_buffer_size: raw.dma_buffer_size,
                });
            }
        }
        if !raw.master && !synchronising && raw.execution_mode != ExecMode::Spawned {
            return Err(ValidationError::NonSyncRequiresSpawned);
        }

        let downsample_factor = if raw.master { 1 } else { raw.downsample_factor };

        Ok(Config {
            node_id: raw.node_id_number,
            n_hosts: raw.number_of_hosts,
            is_master: raw.master,
            device: raw.device,
            cpu_mask: raw.cpu_mask,
            stack_size: raw.stack_size,
            read_offset: raw.read_offset,
            write_offset: raw.write_offset,
            input_size: raw.input_size,
            output_size: raw.output_size,
            downsample_factor,
            start_cycle: raw.start_cycle,
            cycle_budget: raw.cycles,
            timeout: std::time::Duration::from_micros(raw.timeout_us.max(0.0) as u64),
            init_run_time: raw.init_run_time,
            master_step_max_retries: raw.master_step_max_retries,
            dma_enabled: raw.use_dma,
            dma_await: raw.wait_dma,
            dma_threshold: raw.dma_threshold,
            dma_buffer_size: raw.dma_buffer_size,
            dma_buffer_phys_addr: raw.dma_buffer_address,
            exec_mode: raw.execution_mode,
        })
    }
}

impl RfmSourceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}

/// Umbrella error covering every fatal failure in loading or validating a
/// [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum RfmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RfmSourceConfig {
        RfmSourceConfig {
            execution_mode: ExecMode::Spawned,
            cpu_mask: 0,
            stack_size: 4096,
            device: "/tmp/rfm0".into(),
            read_offset: SYSTEM_BUFFER,
            write_offset: SYSTEM_BUFFER,
            input_size: 40,
            output_size: 16,
            use_dma: false,
            dma_buffer_address: 0,
            wait_dma: true,
            dma_buffer_size: 0,
            dma_threshold: 0,
            downsample_factor: 1,
            start_cycle: 0,
            master: true,
            init_run_time: 0,
            master_step_max_retries: 100,
            number_of_hosts: 2,
            timeout_us: 20.0,
            node_id_number: 0,
            cycles: None,
        }
    }

    #[test]
    fn valid_master_config_builds() {
        let cfg = Config::from_raw(base_raw(), true).unwrap();
        assert!(cfg.is_master);
        assert_eq!(cfg.downsample_factor, 1);
    }

    #[test]
    fn master_with_nonzero_node_id_is_rejected() {
        let mut raw = base_raw();
        raw.node_id_number = 1;
        assert_eq!(
            Config::from_raw(raw, true).unwrap_err(),
            ValidationError::MasterNodeIdMismatch { master: true, node_id: 1 }
        );
    }

    #[test]
    fn slave_node_id_out_of_range_is_rejected() {
        let mut raw = base_raw();
        raw.master = false;
        raw.node_id_number = 0;
        raw.number_of_hosts = 3;
        assert_eq!(
            Config::from_raw(raw, true).unwrap_err(),
            ValidationError::SlaveNodeIdOutOfRange { node_id: 0, n_hosts: 3 }
        );
    }

    #[test]
    fn offsets_below_system_buffer_are_rejected() {
        let mut raw = base_raw();
        raw.read_offset = 10;
        assert_eq!(Config::from_raw(raw, true).unwrap_err(), ValidationError::ReadOffsetTooLow(10));
    }

    #[test]
    fn dma_oversized_buffer_is_rejected() {
        let mut raw = base_raw();
        raw.use_dma = true;
        raw.dma_buffer_size = 32;
        raw.input_size = 40;
        assert_eq!(
            Config::from_raw(raw, true).unwrap_err(),
            ValidationError::DmaInputTooLarge { input_size: 40, dma_buffer_size: 32 }
        );
    }

    #[test]
    fn non_master_non_sync_requires_spawned() {
        let mut raw = base_raw();
        raw.master = false;
        raw.node_id_number = 1;
        raw.execution_mode = ExecMode::Inline;
        assert_eq!(Config::from_raw(raw, false).unwrap_err(), ValidationError::NonSyncRequiresSpawned);
    }
}
