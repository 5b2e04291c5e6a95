//! I/O brokers (component I): thin locked wrappers around the
//! compute-thread ↔ worker-thread hand-off of the external buffers, per
//! §4.9 and the compile-time selection table in §4.6.

use std::sync::{Mutex, TryLockError};

/// Which broker variant a direction (input or output) was assigned,
/// computed once at Run entry per the table in §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    /// No locking: the direction is only ever touched by one thread.
    Plain,
    /// Blocks on `rw` for the duration of the copy.
    Synchronised,
    /// Best-effort: skips the copy if `rw` is already held rather than
    /// blocking the caller (used for the non-master/non-sync output path).
    Async,
}

/// Selects `(input, output)` broker kinds for this host, per §4.6's table.
/// A signal is "sync" iff its declared frequency is greater than zero.
pub fn select_brokers(is_master: bool, sync_signal_present: bool) -> (BrokerKind, BrokerKind) {
    if is_master {
        (BrokerKind::Plain, BrokerKind::Synchronised)
    } else if sync_signal_present {
        (BrokerKind::Synchronised, BrokerKind::Plain)
    } else {
        (BrokerKind::Plain, BrokerKind::Async)
    }
}

/// Copies `src` into `dst` according to `kind`, serialising against `rw`
/// where the kind calls for it. Returns `false` only for `Async` when the
/// lock was contended and the copy was skipped.
pub fn broker_copy(kind: BrokerKind, rw: &Mutex<()>, dst: &mut [u8], src: &[u8]) -> bool {
    match kind {
        BrokerKind::Plain => {
            dst.copy_from_slice(src);
            true
        }
        BrokerKind::Synchronised => {
            let _guard = rw.lock().unwrap_or_else(|p| p.into_inner());
            dst.copy_from_slice(src);
            true
        }
        BrokerKind::Async => match rw.try_lock() {
            Ok(_guard) => {
                dst.copy_from_slice(src);
                true
            }
            Err(TryLockError::WouldBlock) => false,
            Err(TryLockError::Poisoned(guard)) => {
                let _guard = guard.into_inner();
                dst.copy_from_slice(src);
                true
            }
        },
    }
}
