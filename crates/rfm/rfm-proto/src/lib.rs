//! `rfm-proto`: the pure, byte-level protocol logic shared by every RFM
//! data source — the shared-memory layout, the layout registry, the remap
//! planner, the sync protocol, and the diagnostic engine. No threads, no
//! configuration parsing; just the wire format and the math built on top of
//! [`rfm_driver::RfmDriver`].
//!
//! # Internal modules
//! - `shm_layout`: offsets and on-wire structures (components §3)
//! - `layout`: publish/fetch/contiguity-check of peer write layouts (B)
//! - `remap`: read-plan construction and scatter (C)
//! - `sync`: master publish / slave poll (D)
//! - `diag`: staleness metric (E)

pub mod diag;
pub mod layout;
pub mod remap;
pub mod shm_layout;
pub mod sync;

pub use layout::{LayoutError, PeerLayoutTable};
pub use remap::{PerPeerRead, ReadPlan};
pub use shm_layout::{PeerLayout, SYSTEM_BUFFER};
