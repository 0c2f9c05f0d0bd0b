//! Parallel loops: call a function once for every index of a range.

use tracing::trace_span;

use crate::error::ComputationError;
use crate::range::Range;
use crate::serial;
use crate::task::{self, Task};
use crate::thread_pool::ThreadPool;
use crate::unwind;

/// Visits every index of a range with a shared body.
struct LoopTask<'a, F> {
    range: Range,
    body: &'a F,
}

impl<F> Task for LoopTask<'_, F>
where
    F: Fn(i64) + Sync,
{
    type Output = ();

    fn range(&self) -> Range {
        self.range
    }

    fn child(&self, range: Range) -> Self {
        LoopTask {
            range,
            body: self.body,
        }
    }

    fn run_sequential(self) {
        self.range.indices().for_each(self.body);
    }

    fn combine(&self, _left: (), _right: ()) {}
}

impl ThreadPool {
    /// Calls `body(i)` for every index `i` of the range, possibly in parallel.
    ///
    /// Each index is visited exactly once, but in no particular order and
    /// possibly concurrently with other indices. The body must therefore not
    /// write to state shared between indices without synchronizing.
    ///
    /// Runs on the calling thread when parallelism is disabled (see
    /// [`set_parallel`](crate::set_parallel)) or when the range holds no more
    /// than `chunk` indices.
    ///
    /// # Errors
    ///
    /// If `body` panics, every job the call forked is joined and the panic is
    /// returned as a [`ComputationError`]. The pool remains usable.
    ///
    /// ```
    /// use std::sync::atomic::{AtomicI64, Ordering};
    /// use stride::{Range, ThreadPool};
    ///
    /// let total = AtomicI64::new(0);
    /// let range = Range::new(0, 100, 2, 4).unwrap();
    /// ThreadPool::global()
    ///     .for_each(range, |i| {
    ///         total.fetch_add(i, Ordering::Relaxed);
    ///     })
    ///     .unwrap();
    /// assert_eq!(total.into_inner(), 2450);
    /// ```
    pub fn for_each<F>(&'static self, range: Range, body: F) -> Result<(), ComputationError>
    where
        F: Fn(i64) + Sync,
    {
        let span = trace_span!("for_each", begin = range.begin(), end = range.end());
        let _enter = span.enter();

        let task = LoopTask { range, body: &body };
        unwind::halt_unwinding(|| {
            if !serial::is_parallel() || range.is_base_case() {
                task.run_sequential();
            } else {
                self.in_worker(|worker| task::compute(task, worker));
            }
        })
        .map_err(ComputationError::new)
    }
}
