//! `rfm-core`: the concurrency skeleton and top-level data source (§4.6–§4.9)
//! built on [`rfm_proto`]'s protocol logic and [`rfm_driver`]'s transport.
//!
//! # Internal modules
//! - `cycle`: per-cycle mutable state (`CycleState`, `Diagnostics`)
//! - `io`: double-buffered external/internal views with counter append (G)
//! - `broker`: locked copy wrappers and the broker-selection table (I)
//! - `semaphore`: the single-slot cycle-trigger semaphore
//! - `orchestrator`: Inline/Spawned execution modes (F)
//! - `lifecycle`: the Run-entry publish/fetch/remap sequence and teardown (H)
//! - `source`: `RfmDataSource`, the `DataSourceOps` capability composition

pub mod broker;
pub mod cycle;
mod error;
pub mod io;
pub mod lifecycle;
pub mod orchestrator;
pub mod semaphore;
pub mod source;

pub use error::RfmError;
pub use orchestrator::{CycleWaiter, ExecOutcome, RtOrchestrator};
pub use source::{DataSourceOps, Direction, RfmDataSource, SignalId};
