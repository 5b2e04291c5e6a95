//! Buffered I/O (component G): the compute-visible "external" view and the
//! DMA-addressable "internal" view, per §4.7.
//!
//! Non-DMA mode heap-allocates both buffers with a `4·nHosts` tail for
//! counter words (the tight bound from SPEC_FULL.md §9's "buffer tail
//! slack" design note — `+1024` is documented there as a conservative upper
//! bound, not applied here since the tight bound covers every plan except
//! one: a window that ends partway through a peer's payload still has to
//! bulk-read that peer's whole payload, since its counter sits at the
//! full-payload tail (§4.3 step 5). `read_cycle` grows `internal_in` on
//! demand for that case instead of over-allocating up front for every plan.

use rfm_driver::{DriverError, RfmDriver};
use rfm_proto::ReadPlan;

pub struct BufferedIo {
    external_in: Vec<u8>,
    internal_in: Vec<u8>,
    external_out: Vec<u8>,
    internal_out: Vec<u8>,
}

impl BufferedIo {
    pub fn new(input_size: u32, output_size: u32, n_hosts: u32) -> Self {
        let counter_tail = 4 * n_hosts as usize;
        Self {
            external_in: vec![0u8; input_size as usize],
            internal_in: vec![0u8; input_size as usize + counter_tail],
            external_out: vec![0u8; output_size as usize],
            internal_out: vec![0u8; output_size as usize + 4],
        }
    }

    pub fn external_in(&self) -> &[u8] {
        &self.external_in
    }

    pub fn external_in_mut(&mut self) -> &mut [u8] {
        &mut self.external_in
    }

    pub fn external_out(&self) -> &[u8] {
        &self.external_out
    }

    pub fn external_out_mut(&mut self) -> &mut [u8] {
        &mut self.external_out
    }

    /// Reads this cycle's plan from the driver into the internal buffer,
    /// then scatters payload bytes into `external_in` and counters into
    /// `counter_read`, per §4.3's scatter step.
    pub fn read_cycle(&mut self, driver: &dyn RfmDriver, plan: &ReadPlan, counter_read: &mut [i32]) -> Result<(), DriverError> {
        if plan.is_empty() {
            return Ok(());
        }
        let total = plan.total_bytes as usize;
        if self.internal_in.len() < total {
            self.internal_in.resize(total, 0);
        }
        driver.read(plan.src_offset(), &mut self.internal_in[..total])?;
        plan.scatter(&self.internal_in[..total], &mut self.external_in, counter_read);
        Ok(())
    }

    /// Copies `external_out` into `internal_out`, appends `own_cycle_counter`,
    /// and writes the result at this host's slot (`write_offset +
    /// node_id·4`), per §4.3's write-side layout and §4.7.
    pub fn write_cycle(&mut self, driver: &dyn RfmDriver, write_offset: u32, node_id: u32, own_cycle_counter: i32) -> Result<(), DriverError> {
        let out_len = self.external_out.len();
        self.internal_out[..out_len].copy_from_slice(&self.external_out);
        self.internal_out[out_len..out_len + 4].copy_from_slice(&own_cycle_counter.to_le_bytes());
        driver.write(write_offset + node_id * 4, &self.internal_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfm_driver::LoopbackDriver;
    use rfm_proto::PeerLayout;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> String {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("/tmp/rfm_io_test_{name}_{ts}")
    }

    #[test]
    fn write_then_read_round_trips_payload_and_counter() {
        let path = scratch_path("roundtrip");
        let driver = LoopbackDriver::create(&path, 0, 65536).unwrap();

        let mut writer = BufferedIo::new(0, 16, 1);
        writer.external_out_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        writer.write_cycle(&driver, 3136, 0, 42).unwrap();

        let peers = rfm_proto::PeerLayoutTable::from_peers(vec![PeerLayout {
            write_offset: 3136,
            output_size: 16,
            downsample_factor: 1,
        }]);
        let plan = ReadPlan::build(&peers, 3136, 16);

        let mut reader = BufferedIo::new(16, 0, 1);
        let mut counters = vec![0i32; 1];
        reader.read_cycle(&driver, &plan, &mut counters).unwrap();

        assert_eq!(reader.external_in(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(counters[0], 42);
        let _ = std::fs::remove_file(&path);
    }
}
