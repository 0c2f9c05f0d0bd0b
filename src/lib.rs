//! Adaptive fork-join loops and ordered reductions over integer ranges.
//!
//! Stride runs loops whose iterations are independent, and reductions that
//! fold one value per index, on a shared pool of worker threads. A range is
//! split in half recursively: the right half is offered to other workers
//! while the current thread carries on with the left half. Splitting stops
//! once a half is no larger than the requested chunk size, or once the
//! current worker already has more queued work than the idle workers could
//! take. The latter keeps nested loops cheap: outer loops split, inner ones
//! mostly run sequentially.
//!
//! ```
//! // Square every element of a 2D array, one row per index.
//! let mut rows = vec![vec![2.0_f32; 256]; 64];
//! let cells: Vec<_> = rows.iter_mut().map(std::sync::Mutex::new).collect();
//! stride::for_each(cells.len() as i64, |i| {
//!     let mut row = cells[i as usize].lock().unwrap();
//!     row.iter_mut().for_each(|x| *x *= *x);
//! })
//! .unwrap();
//! drop(cells);
//! assert!(rows.iter().flatten().all(|&x| x == 4.0));
//!
//! // Reductions combine results in index order, so `combine` only has to be
//! // associative.
//! let digits = stride::reduce(10, |i| i.to_string(), |a, b| a + &b).unwrap();
//! assert_eq!(digits, "0123456789");
//! ```
//!
//! Calls made from inside a worker run on that worker directly, so loops may
//! be nested freely. Calls made from any other thread are handed to the pool
//! and block until they complete.
//!
//! # Errors
//!
//! Invalid ranges are rejected before any work starts. A panic inside a body
//! or combine function is captured, all work already forked by the call is
//! waited for, and the panic is returned as a [`ComputationError`]; the pool
//! stays usable.
//!
//! # Acknowledgments
//!
//! The job, signal and unwinding machinery are modeled on `rayon_core`.

#![no_std]

// -----------------------------------------------------------------------------
// Boilerplate for building without the standard library

extern crate alloc;
extern crate std;

// -----------------------------------------------------------------------------
// Modules

mod config;
mod error;
mod for_each;
mod global;
mod job;
mod range;
mod reduce;
mod serial;
mod signal;
mod task;
mod thread_pool;
mod unwind;

// -----------------------------------------------------------------------------
// Top-level exports

pub use config::DEFAULT_SURPLUS_THRESHOLD;
pub use config::NUM_THREADS_VAR;
pub use config::PoolConfig;
pub use config::SURPLUS_THRESHOLD_VAR;
pub use error::ComputationError;
pub use error::Error;
pub use error::RangeError;
pub use global::for_each;
pub use global::for_each_chunked;
pub use global::for_each_in;
pub use global::for_each_step;
pub use global::reduce;
pub use global::reduce_chunked;
pub use global::reduce_in;
pub use global::reduce_step;
pub use range::Range;
pub use reduce::FnReducer;
pub use reduce::Reducer;
pub use serial::SerialGuard;
pub use serial::is_parallel;
pub use serial::serial;
pub use serial::set_parallel;
pub use thread_pool::ThreadPool;
pub use thread_pool::Worker;
pub use thread_pool::current_thread_is_worker;

// -----------------------------------------------------------------------------
// Platform Support

// All threading primitives are imported through this module, so the rest of
// the crate has a single place to look for them.
mod platform {
    pub use alloc::sync::Arc;
    pub use core::sync::atomic::AtomicBool;
    pub use core::sync::atomic::AtomicU32;
    pub use core::sync::atomic::AtomicUsize;
    pub use core::sync::atomic::Ordering;
    pub use core::sync::atomic::fence;
    pub use std::sync::Barrier;
    pub use std::sync::Condvar;
    pub use std::sync::Mutex;
    pub use std::sync::PoisonError;
    pub use std::thread::Builder as ThreadBuilder;
    pub use std::thread::available_parallelism;
    pub use std::thread_local;
}
