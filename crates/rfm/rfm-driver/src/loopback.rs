//! File-backed stand-in transport for the RFM card.
//!
//! A real RFM card is a PCI device mapping a shared byte array into every
//! host's address space; [`LoopbackDriver`] reproduces exactly that contract
//! over a single memory-mapped file instead, so every host-role instance in
//! a test (or across processes on the same machine) opens the same file and
//! observes the same bytes a real card would carry between them. It is not a
//! mock of the hardware driver's *behaviour* — it implements the identical
//! [`RfmDriver`] trait and the identical byte-for-byte semantics, just over a
//! different physical transport.

use crate::DriverError;
use crate::RfmDriver;
use lithos_mmap::MmapFileMut;
use std::path::Path;
use std::sync::Mutex;

/// A file-backed [`RfmDriver`]. Every peek/poke/read/write is a volatile
/// access into the memory-mapped region; no caching is performed, matching
/// how a real card's window behaves.
pub struct LoopbackDriver {
    node_id: u32,
    mmap: MmapFileMut,
    closed: bool,
    dma: Mutex<Option<DmaRegion>>,
    dma_threshold: u32,
}

/// Scratch buffer standing in for the kernel-reserved physical DMA region.
/// The loopback transport has no real DMA engine, so `map_dma` simply
/// reserves `len` bytes of heap memory at a notional offset.
struct DmaRegion {
    phys_addr: u64,
    buf: Vec<u8>,
}

impl LoopbackDriver {
    /// Creates a new backing file of `region_len` bytes and opens it for
    /// this `node_id`. Use this for the first host to attach to a given
    /// device path; subsequent hosts should use [`Self::open`].
    pub fn create(path: impl AsRef<Path>, node_id: u32, region_len: u64) -> Result<Self, DriverError> {
        let mmap = MmapFileMut::create_rw(&path, region_len).map_err(|source| DriverError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Ok(Self {
            node_id,
            mmap,
            closed: false,
            dma: Mutex::new(None),
            dma_threshold: 0,
        })
    }

    /// Opens an already-created backing file for this `node_id`.
    pub fn open(path: impl AsRef<Path>, node_id: u32) -> Result<Self, DriverError> {
        let mmap = MmapFileMut::open_rw(&path).map_err(|source| DriverError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Ok(Self {
            node_id,
            mmap,
            closed: false,
            dma: Mutex::new(None),
            dma_threshold: 0,
        })
    }

    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<(), DriverError> {
        let region_len = self.mmap.len();
        let end = offset as usize + len;
        if end > region_len {
            return Err(DriverError::OutOfBounds {
                offset,
                len,
                region_len,
            });
        }
        Ok(())
    }

    /// Raw pointer to `offset`, valid for the mmap's lifetime.
    ///
    /// # Safety
    /// Callers must have already bounds-checked `offset` against the
    /// backing region length.
    unsafe fn ptr_at(&self, offset: u32) -> *mut u8 {
        // SAFETY: MmapFileMut keeps the file (and thus the mapping) alive
        // for as long as `self` lives; `as_mut_ptr` is only `&mut` in
        // signature because memmap2 exposes it that way, but the region is
        // genuinely hardware-like shared memory where concurrent access is
        // expected and arbitrated at a higher layer (the ready-flag seqlock,
        // per-peer slices), not by Rust's aliasing rules.
        let base = (&self.mmap as *const MmapFileMut as *mut MmapFileMut).as_mut().unwrap().as_mut_ptr();
        base.add(offset as usize)
    }
}

impl RfmDriver for LoopbackDriver {
    fn node_id(&self) -> u32 {
        self.node_id
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        Ok(())
    }

    fn peek8(&self, offset: u32) -> Result<u8, DriverError> {
        self.check_open()?;
        self.check_bounds(offset, 1)?;
        unsafe { Ok(std::ptr::read_volatile(self.ptr_at(offset))) }
    }

    fn peek32(&self, offset: u32) -> Result<u32, DriverError> {
        self.check_open()?;
        self.check_bounds(offset, 4)?;
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            unsafe {
                *b = std::ptr::read_volatile(self.ptr_at(offset + i as u32));
            }
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn poke8(&self, offset: u32, value: u8) -> Result<(), DriverError> {
        self.check_open()?;
        self.check_bounds(offset, 1)?;
        unsafe { std::ptr::write_volatile(self.ptr_at(offset), value) };
        Ok(())
    }

    fn poke32(&self, offset: u32, value: u32) -> Result<(), DriverError> {
        self.check_open()?;
        self.check_bounds(offset, 4)?;
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            unsafe {
                std::ptr::write_volatile(self.ptr_at(offset + i as u32), *b);
            }
        }
        Ok(())
    }

    fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), DriverError> {
        self.check_open()?;
        self.check_bounds(offset, dst.len())?;
        for (i, b) in dst.iter_mut().enumerate() {
            unsafe {
                *b = std::ptr::read_volatile(self.ptr_at(offset + i as u32));
            }
        }
        Ok(())
    }

    fn write(&self, offset: u32, src: &[u8]) -> Result<(), DriverError> {
        self.check_open()?;
        self.check_bounds(offset, src.len())?;
        for (i, b) in src.iter().enumerate() {
            unsafe {
                std::ptr::write_volatile(self.ptr_at(offset + i as u32), *b);
            }
        }
        Ok(())
    }

    fn map_dma(&mut self, phys_addr: u64, len: usize) -> Result<(), DriverError> {
        self.check_open()?;
        let mut dma = self.dma.lock().unwrap_or_else(|p| p.into_inner());
        *dma = Some(DmaRegion {
            phys_addr,
            buf: vec![0u8; len],
        });
        Ok(())
    }

    fn unmap_dma(&mut self) -> Result<(), DriverError> {
        let mut dma = self.dma.lock().unwrap_or_else(|p| p.into_inner());
        *dma = None;
        Ok(())
    }

    fn dma_read(&self, offset: u32, dst: &mut [u8], _await_completion: bool) -> Result<(), DriverError> {
        {
            let dma = self.dma.lock().unwrap_or_else(|p| p.into_inner());
            if dma.is_none() {
                return Err(DriverError::DmaNotMapped);
            }
        }
        self.read(offset, dst)
    }

    fn dma_write(&self, offset: u32, src: &[u8], _await_completion: bool) -> Result<(), DriverError> {
        {
            let dma = self.dma.lock().unwrap_or_else(|p| p.into_inner());
            if dma.is_none() {
                return Err(DriverError::DmaNotMapped);
            }
        }
        self.write(offset, src)
    }

    fn set_dma_threshold(&mut self, bytes: u32) -> Result<(), DriverError> {
        self.dma_threshold = bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> String {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("/tmp/rfm_loopback_test_{name}_{ts}")
    }

    #[test]
    fn peek_poke_roundtrip() {
        let path = scratch_path("peek_poke");
        let drv = LoopbackDriver::create(&path, 0, 4096).unwrap();
        drv.poke32(100, 0xdead_beef).unwrap();
        assert_eq!(drv.peek32(100).unwrap(), 0xdead_beef);
        drv.poke8(200, 0x7f).unwrap();
        assert_eq!(drv.peek8(200).unwrap(), 0x7f);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn two_hosts_share_the_same_backing_file() {
        let path = scratch_path("shared");
        let master = LoopbackDriver::create(&path, 0, 4096).unwrap();
        let slave = LoopbackDriver::open(&path, 1).unwrap();

        master.write(3136, &[1, 2, 3, 4]).unwrap();
        let mut dst = [0u8; 4];
        slave.read(3136, &mut dst).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let path = scratch_path("oob");
        let drv = LoopbackDriver::create(&path, 0, 16).unwrap();
        assert!(matches!(drv.peek32(20), Err(DriverError::OutOfBounds { .. })));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn closed_handle_rejects_every_call() {
        let path = scratch_path("closed");
        let mut drv = LoopbackDriver::create(&path, 0, 16).unwrap();
        drv.close().unwrap();
        assert!(matches!(drv.peek8(0), Err(DriverError::Closed)));
        assert!(matches!(drv.close(), Ok(())));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn dma_requires_map_first() {
        let path = scratch_path("dma");
        let mut drv = LoopbackDriver::create(&path, 0, 4096).unwrap();
        let mut dst = [0u8; 4];
        assert!(matches!(drv.dma_read(0, &mut dst, true), Err(DriverError::DmaNotMapped)));
        drv.map_dma(0x1000, 4096).unwrap();
        drv.dma_write(0, &[9, 9, 9, 9], true).unwrap();
        drv.dma_read(0, &mut dst, true).unwrap();
        assert_eq!(dst, [9, 9, 9, 9]);
        drv.unmap_dma().unwrap();
        assert!(matches!(drv.dma_read(0, &mut dst, true), Err(DriverError::DmaNotMapped)));
        let _ = std::fs::remove_file(&path);
    }
}
