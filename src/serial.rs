//! The process-wide switch that turns every loop and reduction into a plain
//! sequential loop on the calling thread.
//!
//! This is meant for testing and benchmarking: with parallelism disabled,
//! bodies run in increasing index order on the caller's thread and reductions
//! fold strictly left to right, which makes results reproducible bit for bit.
//! The switch affects every caller in the process, not just the one that
//! flips it.

use crate::platform::*;

static PARALLEL: AtomicBool = AtomicBool::new(true);

/// Enables or disables parallel execution for every subsequent call, from
/// any thread. Parallel execution is enabled by default.
pub fn set_parallel(enabled: bool) {
    PARALLEL.store(enabled, Ordering::Relaxed);
}

/// Returns true unless parallel execution has been disabled with
/// [`set_parallel`].
#[inline]
pub fn is_parallel() -> bool {
    PARALLEL.load(Ordering::Relaxed)
}

/// Disables parallel execution until the returned guard is dropped, which
/// restores the previous setting.
///
/// ```
/// let _serial = stride::serial();
/// assert!(!stride::is_parallel());
/// ```
pub fn serial() -> SerialGuard {
    SerialGuard {
        previous: PARALLEL.swap(false, Ordering::Relaxed),
    }
}

/// Restores the previous parallelism setting when dropped. See [`serial`].
#[must_use = "parallelism is restored as soon as the guard is dropped"]
pub struct SerialGuard {
    previous: bool,
}

impl Drop for SerialGuard {
    fn drop(&mut self) {
        PARALLEL.store(self.previous, Ordering::Relaxed);
    }
}
