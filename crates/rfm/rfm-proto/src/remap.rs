//! Remap planner (component C): turns the peer layout table plus this
//! host's `(readOffset, inputSize)` into a single contiguous bulk-read
//! range and a scatter plan back into the compute-visible input buffer.

use crate::layout::PeerLayoutTable;

/// One peer's contribution to the bulk read: where its payload starts in
/// the physical (counter-interleaved) address space, how many payload bytes
/// of it this host reads (`size`, clamped to the read window), and the
/// untruncated distance from `src_offset` to that peer's own trailing
/// counter (`full_size`). The two only differ for the last peer in the
/// plan, and only when its payload overshoots the window: the driver still
/// has to be asked for the whole thing, since the counter sits at the tail
/// of the peer's full payload, not at the tail of the truncated slice we
/// actually copy out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerPeerRead {
    pub src_offset: u32,
    pub size: u32,
    pub full_size: u32,
}

/// Precomputed scatter-gather description for one host's per-cycle bulk
/// input read. `first_peer = -1` means "nothing to read" (no peer falls
/// inside `[read_offset, read_offset + input_size)`).
#[derive(Debug, Clone)]
pub struct ReadPlan {
    pub first_peer: i32,
    pub last_peer: i32,
    per_peer: Vec<PerPeerRead>,
    pub total_bytes: u32,
}

impl ReadPlan {
    /// `firstPeer = lastPeer = -1`, nothing to read. Not a real
    /// configuration a validated `Config` should ever produce, but useful
    /// as a safe empty default.
    pub fn empty(n_hosts: usize) -> Self {
        Self {
            first_peer: -1,
            last_peer: -1,
            per_peer: vec![PerPeerRead::default(); n_hosts],
            total_bytes: 0,
        }
    }

    pub fn per_peer(&self, node_id: u32) -> PerPeerRead {
        self.per_peer[node_id as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.first_peer == -1
    }

    /// Offset of the bulk read's first byte on the wire.
    pub fn src_offset(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.per_peer[self.first_peer as usize].src_offset
        }
    }

    /// Builds the plan per §4.3: a main scan for peers whose payload starts
    /// inside the window, then three fallbacks for the cases where the
    /// window starts or sits entirely inside a single peer's payload, then
    /// a truncation pass. The truncation applies to whichever peer ended up
    /// as `last_peer`, regardless of which of the four steps discovered it
    /// — the original applies it unconditionally once a peer has been
    /// found at all (`initialHostToRead != -1`).
    pub fn build(peers: &PeerLayoutTable, read_offset: u32, input_size: u32) -> Self {
        let n = peers.len();
        let mut per_peer = vec![PerPeerRead::default(); n];
        let mut first_peer: i32 = -1;
        let mut last_peer: i32 = -1;

        // Step 1: main scan, peer payload start falls inside the window.
        for i in 0..n as i32 {
            let p = peers.get(i as u32).unwrap();
            let start_in_window = p.write_offset >= read_offset && p.write_offset < read_offset + input_size;
            if start_in_window {
                if first_peer == -1 {
                    first_peer = i;
                }
                last_peer = i;
                per_peer[i as usize] = PerPeerRead {
                    src_offset: p.write_offset + i as u32 * 4,
                    size: p.output_size,
                    full_size: p.output_size,
                };
            } else if first_peer != -1 {
                break;
            }
        }

        // Step 2: the peer immediately before `first_peer` may still have
        // its tail inside the window.
        if first_peer >= 1 {
            let prev = peers.get((first_peer - 1) as u32).unwrap();
            if prev.end_offset() > read_offset {
                first_peer -= 1;
                let size = prev.end_offset() - read_offset;
                per_peer[first_peer as usize] = PerPeerRead {
                    src_offset: read_offset + first_peer as u32 * 4,
                    size,
                    full_size: size,
                };
            }
        }

        // Step 3: peer 0 is the unique peer overlapping the window start.
        if first_peer == -1 {
            if let Some(p0) = peers.get(0) {
                if p0.end_offset() > read_offset {
                    first_peer = 0;
                    last_peer = 0;
                    let size = p0.end_offset() - read_offset;
                    per_peer[0] = PerPeerRead { src_offset: read_offset, size, full_size: size };
                }
            }
        }

        // Step 4: the window sits entirely inside a single peer's payload.
        if first_peer == -1 {
            for i in 0..n as i32 {
                let p = peers.get(i as u32).unwrap();
                if read_offset >= p.write_offset && read_offset < p.end_offset() {
                    first_peer = i;
                    last_peer = i;
                    let size = p.end_offset() - read_offset;
                    per_peer[i as usize] = PerPeerRead {
                        src_offset: read_offset + i as u32 * 4,
                        size,
                        full_size: size,
                    };
                    break;
                }
            }
        }

        // Step 5: truncate the last peer's scattered payload if it
        // overshoots the window. `full_size` is left untouched: the driver
        // still has to be asked for the peer's whole payload, since its
        // trailing counter sits at the full-payload tail, not at the tail
        // of the truncated slice.
        if first_peer != -1 {
            let lp = peers.get(last_peer as u32).unwrap();
            if lp.end_offset() >= read_offset + input_size {
                let entry = &mut per_peer[last_peer as usize];
                entry.size = read_offset + input_size - entry.src_offset + last_peer as u32 * 4;
            }
        }

        let total_bytes = if first_peer == -1 {
            0
        } else {
            let leading: u32 = (first_peer..last_peer).map(|i| per_peer[i as usize].size + 4).sum();
            leading + per_peer[last_peer as usize].full_size + 4
        };

        Self {
            first_peer,
            last_peer,
            per_peer,
            total_bytes,
        }
    }

    /// Scatters a bulk-read buffer (laid out as
    /// `[payload_first][counter_first][payload_first+1][counter_first+1]...`)
    /// into `external` (concatenated peer payloads, in nodeId order) and
    /// `counter_read` (one slot per host, indexed by nodeId).
    pub fn scatter(&self, internal: &[u8], external: &mut [u8], counter_read: &mut [i32]) {
        if self.is_empty() {
            return;
        }

        let mut internal_cursor = 0usize;
        let mut external_cursor = 0usize;

        for i in self.first_peer..=self.last_peer {
            let entry = self.per_peer[i as usize];
            let size = entry.size as usize;

            external[external_cursor..external_cursor + size]
                .copy_from_slice(&internal[internal_cursor..internal_cursor + size]);
            external_cursor += size;

            // The last peer's counter sits at the tail of its full,
            // untruncated payload, not right after the (possibly
            // window-truncated) slice we just copied out.
            let counter_at = internal_cursor + if i == self.last_peer { entry.full_size as usize } else { size };
            let counter_bytes: [u8; 4] = internal[counter_at..counter_at + 4].try_into().unwrap();
            counter_read[i as usize] = i32::from_le_bytes(counter_bytes);
            internal_cursor = counter_at + 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm_layout::PeerLayout;

    fn table(layouts: &[(u32, u32, u32)]) -> PeerLayoutTable {
        PeerLayoutTable::from_peers(
            layouts
                .iter()
                .map(|&(wo, os, dsf)| PeerLayout {
                    write_offset: wo,
                    output_size: os,
                    downsample_factor: dsf,
                })
                .collect(),
        )
    }

    #[test]
    fn two_host_master_slave_scenario() {
        let peers = table(&[(3136, 16, 1), (3156, 16, 1)]);
        let plan = ReadPlan::build(&peers, 3136, 40);
        assert_eq!(plan.first_peer, 0);
        assert_eq!(plan.last_peer, 1);
        assert_eq!(plan.total_bytes, 40);
        assert_eq!(plan.per_peer(0), PerPeerRead { src_offset: 3136, size: 16, full_size: 16 });
        assert_eq!(plan.per_peer(1), PerPeerRead { src_offset: 3160, size: 16, full_size: 16 });
    }

    #[test]
    fn partial_window_inside_single_peer() {
        let peers = table(&[(3136, 16, 1)]);
        let plan = ReadPlan::build(&peers, 3140, 8);
        assert_eq!(plan.first_peer, 0);
        assert_eq!(plan.last_peer, 0);
        // Scattered size is clamped to the window (matches input_size), but
        // the bulk read still has to reach the peer's real trailing
        // counter, 12 bytes further into its full payload.
        assert_eq!(plan.per_peer(0), PerPeerRead { src_offset: 3140, size: 8, full_size: 12 });
        assert_eq!(plan.total_bytes, 16);
    }

    #[test]
    fn partial_window_scatter_reads_counter_from_full_payload_tail() {
        let peers = table(&[(3136, 16, 1)]);
        let plan = ReadPlan::build(&peers, 3140, 8);
        assert_eq!(plan.total_bytes, 16);

        // physical bytes from offset 3140: 12 bytes of payload tail, then
        // the real counter, matching `full_size` + 4.
        let internal: Vec<u8> = vec![
            1, 2, 3, 4, 5, 6, 7, 8, // payload bytes scattered into external
            9, 10, 11, 12, // payload bytes beyond the window, not scattered
            42, 0, 0, 0, // real counter = 42
        ];
        let mut external = vec![0u8; 8];
        let mut counters = vec![0i32; 1];
        plan.scatter(&internal, &mut external, &mut counters);

        assert_eq!(external, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(counters, vec![42]);
    }

    #[test]
    fn scatter_reproduces_payload_and_counters() {
        let peers = table(&[(3136, 4, 1), (3140, 4, 1)]);
        let plan = ReadPlan::build(&peers, 3136, 20);
        assert_eq!(plan.total_bytes, 16);

        // physical bytes: payload0(4) counter0(4) payload1(4) counter1(4)
        let internal: Vec<u8> = vec![
            1, 2, 3, 4, // payload0
            7, 0, 0, 0, // counter0 = 7
            5, 6, 7, 8, // payload1
            9, 0, 0, 0, // counter1 = 9
        ];
        let mut external = vec![0u8; 8];
        let mut counters = vec![0i32; 2];
        plan.scatter(&internal, &mut external, &mut counters);

        assert_eq!(external, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(counters, vec![7, 9]);
    }

    #[test]
    fn no_peer_in_window_yields_empty_plan() {
        let plan = ReadPlan::empty(3);
        assert!(plan.is_empty());
        assert_eq!(plan.total_bytes, 0);
    }
}
