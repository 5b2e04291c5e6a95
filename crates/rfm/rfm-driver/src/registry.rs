use std::sync::{Mutex, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};

static GLOBAL_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static INSTANCE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Process-wide handle shared by every `RfmDriver` instance in this process.
///
/// The vendor driver is not re-entrant: concurrent RFM I/O issued from two
/// data-source instances in the same process must be serialised. The first
/// `RwGlobal::attach()` call lazily creates the shared mutex; the last drop
/// releases the instance count back to zero. The mutex itself is handed out
/// by reference (`lock()`), not owned — callers wrap their own critical
/// sections around individual driver calls.
pub struct RwGlobal {
    _private: (),
}

impl RwGlobal {
    /// Attaches to (creating if necessary) the process-wide RFM mutex.
    pub fn attach() -> Self {
        GLOBAL_LOCK.get_or_init(|| Mutex::new(()));
        INSTANCE_COUNT.fetch_add(1, Ordering::AcqRel);
        Self { _private: () }
    }

    /// Acquires the process-wide RFM mutex for the duration of `f`.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let lock = GLOBAL_LOCK.get().expect("RwGlobal attached without initializing lock");
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    /// Number of currently-attached data-source instances in this process.
    pub fn instance_count() -> usize {
        INSTANCE_COUNT.load(Ordering::Acquire)
    }
}

impl Drop for RwGlobal {
    fn drop(&mut self) {
        INSTANCE_COUNT.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for RwGlobal {
    fn default() -> Self {
        Self::attach()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_drop_tracks_instance_count() {
        let before = RwGlobal::instance_count();
        let a = RwGlobal::attach();
        assert_eq!(RwGlobal::instance_count(), before + 1);
        let b = RwGlobal::attach();
        assert_eq!(RwGlobal::instance_count(), before + 2);
        drop(a);
        assert_eq!(RwGlobal::instance_count(), before + 1);
        drop(b);
        assert_eq!(RwGlobal::instance_count(), before);
    }

    #[test]
    fn with_lock_serialises_access() {
        let rw = RwGlobal::attach();
        let result = rw.with_lock(|| 1 + 1);
        assert_eq!(result, 2);
    }
}
