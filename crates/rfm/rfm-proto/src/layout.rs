//! Layout registry (component B): publishes this host's write layout into
//! the shared header, fetches every peer's, and checks contiguity.

use crate::shm_layout::{PeerLayout, PROTOCOL_BASE, PEER_LAYOUT_SIZE};
use rfm_driver::{DriverError, RfmDriver};

/// `PeerLayoutTable` — one [`PeerLayout`] per host, indexed by `node_id`,
/// populated once at the start of Run.
#[derive(Debug, Clone, Default)]
pub struct PeerLayoutTable {
    peers: Vec<PeerLayout>,
}

/// Failure publishing or fetching the peer layout table.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to publish own layout to the RFM header")]
    Publish(#[source] DriverError),

    #[error("failed to fetch peer layout table from the RFM header")]
    Fetch(#[source] DriverError),

    #[error("peer layouts are not contiguous: host {index} ends at {end} but host {index}+1 starts at {next_start}")]
    NotContiguous {
        index: u32,
        end: u32,
        next_start: u32,
    },
}

impl PeerLayoutTable {
    /// Builds a table directly from already-known peer layouts, bypassing
    /// the publish/fetch round trip. Used by tests and by any caller that
    /// already has the full table (e.g. replaying a recorded header).
    pub fn from_peers(peers: Vec<PeerLayout>) -> Self {
        Self { peers }
    }

    /// Publishes `own` at `PROTOCOL_BASE + node_id * PEER_LAYOUT_SIZE` via
    /// three 32-bit pokes. All three must succeed.
    pub fn publish(driver: &dyn RfmDriver, node_id: u32, own: PeerLayout) -> Result<(), LayoutError> {
        let base = PeerLayout::header_offset(node_id);
        driver
            .poke32(base, own.write_offset)
            .map_err(LayoutError::Publish)?;
        driver
            .poke32(base + 4, own.output_size)
            .map_err(LayoutError::Publish)?;
        driver
            .poke32(base + 8, own.downsample_factor)
            .map_err(LayoutError::Publish)?;
        Ok(())
    }

    /// Bulk-reads `n_hosts * PEER_LAYOUT_SIZE` bytes starting at
    /// `PROTOCOL_BASE` and parses them into a table.
    pub fn fetch(driver: &dyn RfmDriver, n_hosts: u32) -> Result<Self, LayoutError> {
        let mut staging = vec![0u8; (n_hosts * PEER_LAYOUT_SIZE) as usize];
        driver.read(PROTOCOL_BASE, &mut staging).map_err(LayoutError::Fetch)?;

        let peers = staging
            .chunks_exact(PEER_LAYOUT_SIZE as usize)
            .map(PeerLayout::from_bytes)
            .collect();

        Ok(Self { peers })
    }

    /// Requires `layout[i].write_offset + layout[i].output_size ==
    /// layout[i+1].write_offset` for every adjacent pair. Reports the first
    /// offending index, matching the original system's diagnostic message.
    pub fn check_contiguity(&self) -> Result<(), LayoutError> {
        for i in 0..self.peers.len().saturating_sub(1) {
            let end = self.peers[i].end_offset();
            let next_start = self.peers[i + 1].write_offset;
            if end != next_start {
                return Err(LayoutError::NotContiguous {
                    index: i as u32,
                    end,
                    next_start,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, node_id: u32) -> Option<PeerLayout> {
        self.peers.get(node_id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, PeerLayout)> + '_ {
        self.peers.iter().enumerate().map(|(i, p)| (i as u32, *p))
    }
}
