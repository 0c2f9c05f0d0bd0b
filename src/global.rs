//! Loops and reductions on the global thread pool.
//!
//! Each operation comes in four forms, from `0..end` with unit step up to a
//! fully specified range with explicit step and chunk size. Omitted step and
//! chunk sizes default to one.

use crate::error::Error;
use crate::range::Range;
use crate::thread_pool::ThreadPool;

// -----------------------------------------------------------------------------
// Loops

/// Calls `body(i)` for `i` in `0..end`, possibly in parallel.
///
/// ```
/// let squares: Vec<_> = (0..64).map(|_| std::sync::atomic::AtomicI64::new(0)).collect();
/// stride::for_each(64, |i| {
///     squares[i as usize].store(i * i, std::sync::atomic::Ordering::Relaxed);
/// })
/// .unwrap();
/// assert_eq!(squares[7].load(std::sync::atomic::Ordering::Relaxed), 49);
/// ```
///
/// See [`ThreadPool::for_each`] for details.
pub fn for_each<F>(end: i64, body: F) -> Result<(), Error>
where
    F: Fn(i64) + Sync,
{
    for_each_chunked(0, end, 1, 1, body)
}

/// Calls `body(i)` for `i` in `begin..end`, possibly in parallel.
pub fn for_each_in<F>(begin: i64, end: i64, body: F) -> Result<(), Error>
where
    F: Fn(i64) + Sync,
{
    for_each_chunked(begin, end, 1, 1, body)
}

/// Calls `body(i)` for `i = begin, begin + step, ...` below `end`, possibly
/// in parallel.
pub fn for_each_step<F>(begin: i64, end: i64, step: i64, body: F) -> Result<(), Error>
where
    F: Fn(i64) + Sync,
{
    for_each_chunked(begin, end, step, 1, body)
}

/// Calls `body(i)` for `i = begin, begin + step, ...` below `end`, possibly
/// in parallel, never splitting off fewer than `chunk` indices.
///
/// # Errors
///
/// Returns [`Error::Argument`] without calling `body` if `begin >= end`,
/// `step <= 0` or `chunk <= 0`, and [`Error::Computation`] if `body` panics.
pub fn for_each_chunked<F>(begin: i64, end: i64, step: i64, chunk: i64, body: F) -> Result<(), Error>
where
    F: Fn(i64) + Sync,
{
    let range = Range::new(begin, end, step, chunk)?;
    ThreadPool::global().for_each(range, body)?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Reductions

/// Folds `body(i)` for `i` in `0..end` with `combine`, possibly in parallel.
///
/// ```
/// let sum = stride::reduce(101, |i| i, |a, b| a + b).unwrap();
/// assert_eq!(sum, 5050);
/// ```
///
/// See [`ThreadPool::reduce`] for details.
pub fn reduce<T, F, C>(end: i64, body: F, combine: C) -> Result<T, Error>
where
    T: Send,
    F: Fn(i64) -> T + Sync,
    C: Fn(T, T) -> T + Sync,
{
    reduce_chunked(0, end, 1, 1, body, combine)
}

/// Folds `body(i)` for `i` in `begin..end` with `combine`, possibly in
/// parallel.
pub fn reduce_in<T, F, C>(begin: i64, end: i64, body: F, combine: C) -> Result<T, Error>
where
    T: Send,
    F: Fn(i64) -> T + Sync,
    C: Fn(T, T) -> T + Sync,
{
    reduce_chunked(begin, end, 1, 1, body, combine)
}

/// Folds `body(i)` for `i = begin, begin + step, ...` below `end` with
/// `combine`, possibly in parallel.
pub fn reduce_step<T, F, C>(begin: i64, end: i64, step: i64, body: F, combine: C) -> Result<T, Error>
where
    T: Send,
    F: Fn(i64) -> T + Sync,
    C: Fn(T, T) -> T + Sync,
{
    reduce_chunked(begin, end, step, 1, body, combine)
}

/// Folds `body(i)` for `i = begin, begin + step, ...` below `end` with
/// `combine`, possibly in parallel, never splitting off fewer than `chunk`
/// indices.
///
/// ```
/// let sum = stride::reduce_chunked(0, 8, 1, 2, |i| i, |a, b| a + b).unwrap();
/// assert_eq!(sum, 28);
/// ```
///
/// # Errors
///
/// Returns [`Error::Argument`] without calling `body` if `begin >= end`,
/// `step <= 0` or `chunk <= 0`, and [`Error::Computation`] if `body` or
/// `combine` panics.
pub fn reduce_chunked<T, F, C>(
    begin: i64,
    end: i64,
    step: i64,
    chunk: i64,
    body: F,
    combine: C,
) -> Result<T, Error>
where
    T: Send,
    F: Fn(i64) -> T + Sync,
    C: Fn(T, T) -> T + Sync,
{
    let range = Range::new(begin, end, step, chunk)?;
    Ok(ThreadPool::global().reduce(range, body, combine)?)
}
