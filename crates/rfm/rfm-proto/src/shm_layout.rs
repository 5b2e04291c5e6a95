//! Binary layout of the RFM shared-memory region.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ offset 0:  iteration (u32)                                │
//! │ offset 4:  time (u32)                                     │
//! │ offset 8:  reserved (4 bytes)                             │
//! │ offset 12: readyFlag (u8)                                 │
//! │ offset 64: PeerLayout[0..256] (12 bytes each)              │
//! ├──────────────────────────────────────────────────────────┤
//! │ SYSTEM_BUFFER: user data region                            │
//! │   [counter_0][payload_0][counter_1][payload_1]...          │
//! └──────────────────────────────────────────────────────────┘
//! ```

/// Offset of the global `iteration` counter.
pub const ITERATION_OFFSET: u32 = 0;
/// Offset of the global `time` field.
pub const TIME_OFFSET: u32 = 4;
/// Offset of the single-byte ready flag seqlock.
pub const READY_FLAG_OFFSET: u32 = 12;

/// Offset at which the peer layout table begins.
pub const PROTOCOL_BASE: u32 = 64;

/// Maximum number of hosts the peer layout table can describe.
pub const MAX_HOSTS: usize = 256;

/// On-wire size of one [`PeerLayout`] record.
pub const PEER_LAYOUT_SIZE: u32 = 12;

/// First byte of the user data region; everything below this offset is
/// reserved for the system header and the peer layout table.
pub const SYSTEM_BUFFER: u32 = PROTOCOL_BASE + MAX_HOSTS as u32 * PEER_LAYOUT_SIZE;

/// One peer's announced write layout, as published into the system header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerLayout {
    pub write_offset: u32,
    pub output_size: u32,
    pub downsample_factor: u32,
}

impl PeerLayout {
    /// Byte offset within the system header where peer `node_id`'s record
    /// starts.
    pub fn header_offset(node_id: u32) -> u32 {
        PROTOCOL_BASE + node_id * PEER_LAYOUT_SIZE
    }

    /// Deserialises one record from its 12-byte little-endian wire form.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= PEER_LAYOUT_SIZE as usize);
        Self {
            write_offset: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            output_size: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            downsample_factor: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        }
    }

    /// The byte one past the end of this peer's payload, not counting its
    /// trailing counter word.
    pub fn end_offset(&self) -> u32 {
        self.write_offset + self.output_size
    }
}
