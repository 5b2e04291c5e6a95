//! `rfm-driver`: the narrow capability surface the core uses to talk to a
//! reflective-memory card.
//!
//! The vendor driver (`Open/Close/Read/Write/Peek8/Peek32/Poke8/Poke32/DMA*`)
//! is treated as an external collaborator: this crate defines the trait that
//! captures exactly that surface ([`RfmDriver`]) and ships one concrete
//! implementation, [`LoopbackDriver`], that satisfies it over a memory-mapped
//! file instead of real hardware. A real hardware binding would be a second
//! implementor of the same trait behind a `hw` feature; the core is written
//! against the trait and never cares which one it got.
//!
//! # Internal modules
//! - `error`: the driver's error taxonomy
//! - `loopback`: file-backed stand-in transport for development and tests
//! - `registry`: process-wide instance accounting for the exclusive card
//!   resource (see `RwGlobal`)

mod error;
mod loopback;
mod registry;

pub use error::DriverError;
pub use loopback::LoopbackDriver;
pub use registry::RwGlobal;

/// Capability set exposed by a reflective-memory driver binding.
///
/// Every call returns success/failure; the core never interprets what went
/// wrong beyond that. Implementors are expected to be cheap to call from a
/// real-time thread (no heap allocation per call) wherever the underlying
/// transport allows it.
pub trait RfmDriver: Send {
    /// The node identity the card was opened for.
    fn node_id(&self) -> u32;

    /// Closes the underlying handle. Idempotent; a second call is a no-op
    /// success. After closing, every other method returns
    /// [`DriverError::Closed`].
    fn close(&mut self) -> Result<(), DriverError>;

    fn peek8(&self, offset: u32) -> Result<u8, DriverError>;
    fn peek32(&self, offset: u32) -> Result<u32, DriverError>;
    fn poke8(&self, offset: u32, value: u8) -> Result<(), DriverError>;
    fn poke32(&self, offset: u32, value: u32) -> Result<(), DriverError>;

    /// Bulk, non-DMA read of `dst.len()` bytes starting at `offset`.
    fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), DriverError>;
    /// Bulk, non-DMA write of `src` starting at `offset`.
    fn write(&self, offset: u32, src: &[u8]) -> Result<(), DriverError>;

    /// Maps the DMA-reserved region of `len` bytes at physical address
    /// `phys_addr`. Implementations for which DMA is meaningless (like the
    /// loopback transport) accept any address and simply reserve `len` bytes
    /// of scratch space.
    fn map_dma(&mut self, phys_addr: u64, len: usize) -> Result<(), DriverError>;
    fn unmap_dma(&mut self) -> Result<(), DriverError>;

    /// DMA read/write. `await_completion` mirrors the vendor driver's
    /// waited-vs-fire-and-forget variants; a loopback transport has no
    /// asynchronous completion to wait for and treats both the same.
    fn dma_read(&self, offset: u32, dst: &mut [u8], await_completion: bool) -> Result<(), DriverError>;
    fn dma_write(&self, offset: u32, src: &[u8], await_completion: bool) -> Result<(), DriverError>;

    fn set_dma_threshold(&mut self, bytes: u32) -> Result<(), DriverError>;
}
