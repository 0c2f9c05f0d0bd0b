//! This module defines the executable units of work the pool schedules. A job
//! is referred to by a type-erased [`JobRef`], which can be pushed onto a
//! worker's deque, stolen by another worker, or injected from outside the
//! pool, all without moving the underlying job.
//!
//! The only job type is the [`StackJob`]: every job in this crate is either
//! the forked half of a split range or a root task submitted by a blocked
//! external thread, and in both cases the creating frame outlives the job.
//!
//! When using a job, one must be careful to ensure that:
//! (a) The job does not outlive anything it closes over.
//! (b) The job remains valid until it is executed.
//! (c) Each job reference is executed exactly once.

use core::cell::UnsafeCell;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;
use std::thread::Result as ThreadResult;

use crate::signal::Signal;
use crate::thread_pool::Worker;
use crate::unwind;

// -----------------------------------------------------------------------------
// Job

/// A unit of work that may be executed by a worker thread. The `execute`
/// function is designed to interlock with the `JobRef::execute_fn` field.
trait Job {
    /// Runs the job.
    ///
    /// # Safety
    ///
    /// Implementors must specify the invariant of the pointer `this` that the
    /// caller is expected to uphold. This may be called from a different
    /// thread than the one which created the job. Calling this always
    /// completes the job, so it must be called exactly once.
    unsafe fn execute(this: NonNull<()>, worker: &Worker);
}

// -----------------------------------------------------------------------------
// JobRef

/// Effectively a `Job` trait object, without the lifetime.
pub struct JobRef {
    /// Type-erased pointer to the job data.
    job_pointer: NonNull<()>,
    /// Function that knows how to execute the data behind `job_pointer`.
    execute_fn: unsafe fn(NonNull<()>, &Worker),
}

impl JobRef {
    /// Creates a new `JobRef` from raw pointers.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `job_pointer` remains valid to pass to
    /// `execute_fn` until the job is executed.
    #[inline(always)]
    unsafe fn new_raw(job_pointer: NonNull<()>, execute_fn: unsafe fn(NonNull<()>, &Worker)) -> JobRef {
        JobRef {
            job_pointer,
            execute_fn,
        }
    }

    /// Returns an opaque handle that can be saved and compared, without making
    /// `JobRef` itself `Copy + Eq`.
    #[inline(always)]
    pub fn id(&self) -> impl Eq + use<> {
        (self.job_pointer, self.execute_fn)
    }

    /// Executes the job on the given worker.
    #[inline(always)]
    pub fn execute(self, worker: &Worker) {
        // SAFETY: The constructor of `JobRef` is required to ensure this is valid.
        unsafe { (self.execute_fn)(self.job_pointer, worker) }
    }
}

// SAFETY: Jobs are only ever created from `Send` closures, so the pointer can
// be moved to whichever thread ends up executing it.
unsafe impl Send for JobRef {}

// -----------------------------------------------------------------------------
// Stack allocated job

/// A job allocated in the stack frame of the thread that will wait for it.
/// The closure's outcome (its return value, or the panic it raised) is sent
/// back over an embedded [`Signal`].
pub struct StackJob<F, T> {
    f: UnsafeCell<ManuallyDrop<F>>,
    signal: Signal<ThreadResult<T>>,
}

impl<F, T> StackJob<F, T>
where
    F: FnOnce(&Worker) -> T + Send,
    T: Send,
{
    /// Creates a new `StackJob`.
    #[inline(always)]
    pub fn new(f: F) -> StackJob<F, T> {
        StackJob {
            f: UnsafeCell::new(ManuallyDrop::new(f)),
            signal: Signal::new(),
        }
    }

    /// Creates a `JobRef` pointing to this job.
    ///
    /// # Safety
    ///
    /// The `StackJob` must not move and must outlive the returned `JobRef`,
    /// and the `JobRef` must not outlive the data the closure refers to. At
    /// most one `JobRef` may be created for each `StackJob`.
    #[inline(always)]
    pub unsafe fn as_job_ref(&self) -> JobRef {
        let job_pointer = NonNull::from(self).cast();
        // SAFETY: The caller ensures the `StackJob` outlives the `JobRef`, so
        // the pointer stays valid to pass to `Self::execute`, and only one
        // `JobRef` is ever created so `execute` runs at most once.
        unsafe { JobRef::new_raw(job_pointer, Self::execute) }
    }

    /// Recovers the closure so it can be called directly, without indirection.
    ///
    /// # Safety
    ///
    /// The job must not have been executed, and its `JobRef` must have been
    /// discarded.
    #[inline(always)]
    pub unsafe fn into_inner(mut self) -> F {
        // SAFETY: `execute` has not run, so the closure is still present, and
        // `self` is consumed so it cannot be taken twice.
        unsafe { ManuallyDrop::take(self.f.get_mut()) }
    }

    /// Returns the signal over which the outcome of the job is sent.
    #[inline(always)]
    pub fn signal(&self) -> &Signal<ThreadResult<T>> {
        &self.signal
    }
}

impl<F, T> Job for StackJob<F, T>
where
    F: FnOnce(&Worker) -> T + Send,
    T: Send,
{
    /// # Safety
    ///
    /// `this` must point to a live `StackJob<F, T>` until its signal has been
    /// sent, and this may only be called once.
    #[inline(always)]
    unsafe fn execute(this: NonNull<()>, worker: &Worker) {
        // SAFETY: The caller ensures `this` is valid until the signal is sent.
        let this = unsafe { this.cast::<Self>().as_ref() };
        // The waiting frame owns this job; unwinding past here before the
        // signal is sent would leave it waiting on freed memory.
        let abort_guard = unwind::AbortOnDrop;
        // SAFETY: The closure is only taken here or in `into_inner`, which
        // consumes the job and so cannot race with us, and this function runs
        // exactly once.
        let f = unsafe { ManuallyDrop::take(&mut *this.f.get()) };
        // Body panics are captured and handed to the joining thread.
        let result = unwind::halt_unwinding(|| f(worker));
        // SAFETY: The signal lives inside the job, which is valid until the
        // signal is sent.
        unsafe { Signal::send(&this.signal, result) };
        // The job may be gone by now. A worker waiting for it may be asleep
        // in the pool rather than on the signal, so wake the pool as well.
        worker.thread_pool().wake_all();
        core::mem::forget(abort_guard);
    }
}
