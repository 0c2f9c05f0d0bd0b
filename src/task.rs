//! The recursive fork/join driver shared by loops and reductions.
//!
//! A task owns a [`Range`] and borrows the caller's functions. Running a task
//! either processes its range sequentially or bisects it, forks the right
//! half, recurses into the left half on the current thread, joins the right
//! half and combines the two results, left before right.

use tracing::trace;

use crate::range::Range;
use crate::thread_pool::Worker;

/// A unit of work over a range that can be split into independent halves.
pub(crate) trait Task: Sized + Send {
    /// The value produced by processing a range.
    type Output: Send;

    /// The range this task covers.
    fn range(&self) -> Range;

    /// A task of the same kind covering `range`, a part of this task's range.
    fn child(&self, range: Range) -> Self;

    /// Processes the whole range on the current thread, in increasing index
    /// order.
    fn run_sequential(self) -> Self::Output;

    /// Combines the results of two adjacent parts. `left` always comes from
    /// the lower-index part.
    fn combine(&self, left: Self::Output, right: Self::Output) -> Self::Output;
}

/// Runs a task on the given worker, splitting it as long as the range is
/// larger than its chunk size and the worker is not already swamped.
pub(crate) fn compute<T: Task>(task: T, worker: &Worker) -> T::Output {
    let Some((left, right)) = split_if_profitable(task.range(), worker) else {
        return task.run_sequential();
    };

    let left_task = task.child(left);
    let right_task = task.child(right);
    let (left_output, right_output) = worker.join(
        |worker| compute(left_task, worker),
        |worker| compute(right_task, worker),
    );
    task.combine(left_output, right_output)
}

/// Bisects the range unless it is a base case or the worker already holds
/// more surplus jobs than the pool's threshold.
#[inline]
fn split_if_profitable(range: Range, worker: &Worker) -> Option<(Range, Range)> {
    if range.is_base_case() {
        return None;
    }
    let surplus = worker.surplus_queued_tasks();
    if surplus > worker.thread_pool().surplus_threshold() {
        trace!(
            "surplus of {} queued tasks, running {} indices sequentially",
            surplus,
            range.len()
        );
        return None;
    }
    range.split()
}
