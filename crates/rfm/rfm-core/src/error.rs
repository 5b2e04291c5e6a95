//! Umbrella error type for the lifecycle layer (§7 "Error handling design").
//!
//! Configuration and layout errors are fatal at init/state-transition and
//! propagate up through this enum; run-time RFM I/O errors never reach here
//! — they are absorbed by the sync protocol's retry/timeout loop and
//! surfaced through `Diagnostics` instead (see `rfm_proto::sync`,
//! `rfm_proto::diag`).

use rfm_config::ValidationError;
use rfm_driver::DriverError;
use rfm_proto::LayoutError;

#[derive(Debug, thiserror::Error)]
pub enum RfmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("driver error during initialisation or teardown")]
    Device(#[from] DriverError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
