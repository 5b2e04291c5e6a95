//! Sync protocol (component D): master cycle/time publication under a
//! ready-flag handshake, and the slave-side poll with torn-read detection.

use crate::shm_layout::{ITERATION_OFFSET, READY_FLAG_OFFSET, TIME_OFFSET};
use rfm_driver::RfmDriver;
use std::time::{Duration, Instant};

/// Master-side cycle/time publisher.
///
/// One [`MasterStep::publish`] call performs the whole lock/write/write/
/// unlock sequence; it never retries internally — the caller retries up to
/// its own `master_step_max_retries` budget across successive calls.
pub struct MasterStep;

impl MasterStep {
    /// Publishes `(iteration, time)`. Returns `false` on the first failed
    /// driver call; any failure leaves `readyFlag` in whatever state the
    /// failing call left it (the caller's retry loop re-attempts the full
    /// sequence from the top).
    pub fn publish(driver: &dyn RfmDriver, iteration: i32, time: i32) -> bool {
        if driver.poke8(READY_FLAG_OFFSET, 0).is_err() {
            return false;
        }
        if driver.poke32(ITERATION_OFFSET, iteration as u32).is_err() {
            return false;
        }
        if driver.poke32(TIME_OFFSET, time as u32).is_err() {
            return false;
        }
        driver.poke8(READY_FLAG_OFFSET, 1).is_ok()
    }

    /// Runs [`Self::publish`] up to `max_retries` times, returning the
    /// number of failed attempts before success (or `max_retries` if every
    /// attempt failed).
    pub fn publish_with_retries(driver: &dyn RfmDriver, iteration: i32, time: i32, max_retries: u16) -> (bool, u16) {
        let mut retries = 0u16;
        while retries < max_retries {
            if Self::publish(driver, iteration, time) {
                return (true, retries);
            }
            retries += 1;
        }
        (false, retries)
    }
}

/// Slave-side single poll attempt, implementing the seqlock read protocol
/// from §4.4: peek the ready flag, read the iteration, re-check the flag.
/// Returns `None` if the master was mid-write either before or after the
/// iteration read (a torn read is retried by the caller, never surfaced).
pub fn try_read_iteration(driver: &dyn RfmDriver) -> Option<i32> {
    let before = driver.peek8(READY_FLAG_OFFSET).ok()?;
    if before == 0 {
        return None;
    }

    let iteration = driver.peek32(ITERATION_OFFSET).ok()? as i32;

    let after = driver.peek8(READY_FLAG_OFFSET).ok()?;
    if after == 0 {
        return None;
    }

    Some(iteration)
}

/// Loops [`try_read_iteration`] until it returns `Some` or `deadline`
/// elapses, matching the slave's wall-clock-bounded poll in §5.
pub fn poll_iteration_until(driver: &dyn RfmDriver, timeout: Duration) -> Option<i32> {
    let start = Instant::now();
    loop {
        if let Some(iter) = try_read_iteration(driver) {
            return Some(iter);
        }
        if start.elapsed() >= timeout {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfm_driver::LoopbackDriver;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> String {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("/tmp/rfm_sync_test_{name}_{ts}")
    }

    #[test]
    fn publish_then_read_round_trips() {
        let path = scratch_path("roundtrip");
        let driver = LoopbackDriver::create(&path, 0, 4096).unwrap();

        assert!(MasterStep::publish(&driver, 7, 700));
        assert_eq!(try_read_iteration(&driver), Some(7));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ready_flag_down_hides_the_iteration() {
        let path = scratch_path("hidden");
        let driver = LoopbackDriver::create(&path, 0, 4096).unwrap();

        driver.poke32(ITERATION_OFFSET, 99).unwrap();
        driver.poke8(READY_FLAG_OFFSET, 0).unwrap();
        assert_eq!(try_read_iteration(&driver), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn poll_until_times_out_when_never_ready() {
        let path = scratch_path("timeout");
        let driver = LoopbackDriver::create(&path, 0, 4096).unwrap();
        driver.poke8(READY_FLAG_OFFSET, 0).unwrap();

        let result = poll_iteration_until(&driver, Duration::from_millis(5));
        assert_eq!(result, None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn retries_exhaust_after_every_attempt_fails() {
        // A closed driver fails every poke, so publish should never succeed.
        let path = scratch_path("exhaust");
        let mut driver = LoopbackDriver::create(&path, 0, 4096).unwrap();
        driver.close().unwrap();

        let (ok, retries) = MasterStep::publish_with_retries(&driver, 1, 1, 5);
        assert!(!ok);
        assert_eq!(retries, 5);
        let _ = std::fs::remove_file(&path);
    }
}
