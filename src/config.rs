//! Configuration options for a thread pool.

use alloc::borrow::Cow;
use core::num::NonZero;
use core::str::FromStr;
use std::env;

use tracing::debug;

use crate::platform::available_parallelism;

/// Environment variable overriding the number of worker threads.
pub const NUM_THREADS_VAR: &str = "STRIDE_NUM_THREADS";

/// Environment variable overriding the surplus queued task threshold.
pub const SURPLUS_THRESHOLD_VAR: &str = "STRIDE_SURPLUS_THRESHOLD";

/// The default surplus queued task threshold. Once a worker holds more than
/// this many queued jobs beyond what idle workers could take, ranges it
/// processes stop splitting.
///
/// This value was tuned for a different scheduler and is a starting point
/// rather than a measured optimum for this one.
pub const DEFAULT_SURPLUS_THRESHOLD: isize = 6;

/// Collects the options used to build a [`ThreadPool`](crate::ThreadPool).
///
/// ```
/// use stride::PoolConfig;
///
/// let config = PoolConfig::default()
///     .num_threads(Some(4))
///     .surplus_threshold(2)
///     .thread_name("physics");
/// assert_eq!(config.get_num_threads(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct PoolConfig {
    num_threads: Option<usize>,
    surplus_threshold: isize,
    thread_name: Cow<'static, str>,
}

impl PoolConfig {
    /// Starts from the defaults and applies the `STRIDE_NUM_THREADS` and
    /// `STRIDE_SURPLUS_THRESHOLD` environment variables. Values that fail to
    /// parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(num_threads) = parse_var::<usize>(NUM_THREADS_VAR) {
            config = config.num_threads(Some(num_threads));
        }
        if let Some(threshold) = parse_var::<isize>(SURPLUS_THRESHOLD_VAR) {
            config = config.surplus_threshold(threshold);
        }
        config
    }

    /// Get the number of worker threads. This is always at least one.
    pub fn get_num_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| available_parallelism().map(NonZero::get).unwrap_or(1))
            .max(1)
    }

    /// Set the number of worker threads. `None` means one per available core.
    pub fn num_threads(self, num_threads: Option<usize>) -> Self {
        Self {
            num_threads,
            ..self
        }
    }

    /// Get the surplus queued task threshold.
    pub fn get_surplus_threshold(&self) -> isize {
        self.surplus_threshold
    }

    /// Set the surplus queued task threshold. Lower values split less under
    /// load; a negative value stops splitting whenever no worker is idle.
    pub fn surplus_threshold(self, surplus_threshold: isize) -> Self {
        Self {
            surplus_threshold,
            ..self
        }
    }

    /// Get the prefix used to name worker threads.
    pub fn get_thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Set the prefix used to name worker threads. Workers are named
    /// `"{prefix} {index}"`.
    pub fn thread_name(self, thread_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            thread_name: thread_name.into(),
            ..self
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            surplus_threshold: DEFAULT_SURPLUS_THRESHOLD,
            thread_name: Cow::Borrowed("stride-worker"),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!("ignoring unparsable value {:?} for {}", value, name);
            None
        }
    }
}
