//! Parallel reductions: compute one value per index and fold them together
//! with an associative combine, in index order.

use core::marker::PhantomData;

use tracing::trace_span;

use crate::error::ComputationError;
use crate::range::Range;
use crate::serial;
use crate::task::{self, Task};
use crate::thread_pool::ThreadPool;
use crate::unwind;

// -----------------------------------------------------------------------------
// Reducers

/// A reduction body: a value for each index, and a way to merge two values.
///
/// `combine` must be associative for the result to be independent of how the
/// range was split. It need not be commutative: the left argument is always
/// the fold of a lower-index region and the right argument the fold of the
/// region immediately above it.
///
/// ```
/// use stride::{Range, Reducer, ThreadPool};
///
/// /// Smallest and largest value of a slice.
/// struct Extent<'a>(&'a [f32]);
///
/// impl Reducer<(f32, f32)> for Extent<'_> {
///     fn compute(&self, i: i64) -> (f32, f32) {
///         (self.0[i as usize], self.0[i as usize])
///     }
///
///     fn combine(&self, a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
///         (a.0.min(b.0), a.1.max(b.1))
///     }
/// }
///
/// let values = [3.0, -1.5, 8.25, 0.0];
/// let range = Range::upto(values.len() as i64).unwrap();
/// let extent = ThreadPool::global().reduce_with(range, &Extent(&values)).unwrap();
/// assert_eq!(extent, (-1.5, 8.25));
/// ```
pub trait Reducer<T>: Sync {
    /// Returns the value for index `i`.
    fn compute(&self, i: i64) -> T;

    /// Merges the values of two adjacent regions, lower region first.
    fn combine(&self, left: T, right: T) -> T;
}

/// Adapts a pair of closures into a [`Reducer`].
#[derive(Clone, Copy, Debug)]
pub struct FnReducer<F, C> {
    body: F,
    combine: C,
}

impl<F, C> FnReducer<F, C> {
    /// Pairs a per-index body with a combine function.
    pub fn new(body: F, combine: C) -> Self {
        Self { body, combine }
    }
}

impl<T, F, C> Reducer<T> for FnReducer<F, C>
where
    F: Fn(i64) -> T + Sync,
    C: Fn(T, T) -> T + Sync,
{
    #[inline]
    fn compute(&self, i: i64) -> T {
        (self.body)(i)
    }

    #[inline]
    fn combine(&self, left: T, right: T) -> T {
        (self.combine)(left, right)
    }
}

// -----------------------------------------------------------------------------
// Reduce task

struct ReduceTask<'a, R, T> {
    range: Range,
    reducer: &'a R,
    _output: PhantomData<fn() -> T>,
}

impl<'a, R, T> ReduceTask<'a, R, T> {
    fn new(range: Range, reducer: &'a R) -> Self {
        ReduceTask {
            range,
            reducer,
            _output: PhantomData,
        }
    }
}

impl<R, T> Task for ReduceTask<'_, R, T>
where
    R: Reducer<T>,
    T: Send,
{
    type Output = T;

    fn range(&self) -> Range {
        self.range
    }

    fn child(&self, range: Range) -> Self {
        ReduceTask::new(range, self.reducer)
    }

    /// Folds left to right: `combine(combine(f(b), f(b + s)), f(b + 2s))`...
    fn run_sequential(self) -> T {
        let reducer = self.reducer;
        let first = reducer.compute(self.range.begin());
        self.range
            .indices()
            .skip(1)
            .fold(first, |acc, i| reducer.combine(acc, reducer.compute(i)))
    }

    fn combine(&self, left: T, right: T) -> T {
        self.reducer.combine(left, right)
    }
}

// -----------------------------------------------------------------------------
// Entry points

impl ThreadPool {
    /// Computes `body(i)` for every index of the range and folds the values
    /// with `combine`, possibly in parallel.
    ///
    /// The result equals the sequential fold
    /// `combine(...combine(combine(body(b), body(b + s)), body(b + 2s))...)`
    /// whenever `combine` is associative, no matter how the range is split or
    /// which parts finish first.
    ///
    /// # Errors
    ///
    /// If `body` or `combine` panics, every job the call forked is joined and
    /// the panic is returned as a [`ComputationError`].
    pub fn reduce<T, F, C>(&'static self, range: Range, body: F, combine: C) -> Result<T, ComputationError>
    where
        T: Send,
        F: Fn(i64) -> T + Sync,
        C: Fn(T, T) -> T + Sync,
    {
        self.reduce_with(range, &FnReducer::new(body, combine))
    }

    /// Like [`ThreadPool::reduce`], with the body and combine supplied by a
    /// [`Reducer`].
    pub fn reduce_with<T, R>(&'static self, range: Range, reducer: &R) -> Result<T, ComputationError>
    where
        T: Send,
        R: Reducer<T>,
    {
        let span = trace_span!("reduce", begin = range.begin(), end = range.end());
        let _enter = span.enter();

        let task = ReduceTask::new(range, reducer);
        unwind::halt_unwinding(|| {
            if !serial::is_parallel() || range.is_base_case() {
                task.run_sequential()
            } else {
                self.in_worker(|worker| task::compute(task, worker))
            }
        })
        .map_err(ComputationError::new)
    }
}
