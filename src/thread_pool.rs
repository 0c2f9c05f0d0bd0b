//! This module contains the worker pool: the worker threads, their
//! work-stealing deques, the injector used by threads outside the pool, and
//! the fork/join primitive that loop and reduce tasks are built on.

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use core::cell::Cell;
use core::ptr;
use std::sync::OnceLock;

use crossbeam_deque::Injector;
use crossbeam_deque::Steal;
use crossbeam_deque::Stealer;
use crossbeam_deque::Worker as Deque;
use tracing::debug;
use tracing::trace;
use tracing::trace_span;

use crate::config::PoolConfig;
use crate::error::Error;
use crate::job::JobRef;
use crate::job::StackJob;
use crate::platform::*;
use crate::signal::Signal;
use crate::unwind;

// -----------------------------------------------------------------------------
// Thread pool types

/// A fixed set of worker threads that execute loops and reductions.
///
/// Each worker owns a deque of jobs. A worker pushes and pops jobs at one end
/// of its own deque, and idle or waiting workers steal from the other end of
/// everyone else's. Threads that do not belong to the pool hand their work to
/// a shared injector and block until it has been executed.
///
/// # Creating Thread Pools
///
/// Most programs only ever use the global pool, which is created on first use
/// (see [`ThreadPool::global`]) or explicitly with [`ThreadPool::init_global`].
/// Additional pools can be created with [`ThreadPool::build`]. Pools are never
/// shut down; their threads park when there is nothing to do and live for the
/// remainder of the process.
///
/// ```
/// use stride::{PoolConfig, Range, ThreadPool};
///
/// let pool = ThreadPool::build(PoolConfig::default().num_threads(Some(2)));
/// let range = Range::upto(100).unwrap();
/// let sum = pool.reduce(range, |i| i, |a, b| a + b).unwrap();
/// assert_eq!(sum, 4950);
/// ```
pub struct ThreadPool {
    config: PoolConfig,
    /// Receives jobs submitted from threads that are not workers of this pool.
    injector: Injector<JobRef>,
    /// One stealer per worker, indexed like the workers.
    stealers: Box<[Stealer<JobRef>]>,
    /// Guards the transition of a worker into sleep.
    sleep_lock: Mutex<()>,
    /// Notified when a job is pushed, and when a stolen job completes.
    wakeup: Condvar,
    /// Number of workers that are asleep or about to be, including those
    /// waiting for a stolen job to complete.
    num_sleeping: AtomicUsize,
}

static GLOBAL_POOL: OnceLock<&'static ThreadPool> = OnceLock::new();

// -----------------------------------------------------------------------------
// Thread pool creation

impl ThreadPool {
    /// Spawns a new pool and returns a handle with a `'static` lifetime. The
    /// worker threads have all started by the time this returns.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a thread.
    #[cold]
    pub fn build(config: PoolConfig) -> &'static ThreadPool {
        let num_threads = config.get_num_threads();
        debug!("building thread pool with {} worker(s)", num_threads);

        let deques: Vec<Deque<JobRef>> = (0..num_threads).map(|_| Deque::new_lifo()).collect();
        let stealers = deques.iter().map(Deque::stealer).collect();

        let thread_pool: &'static ThreadPool = Box::leak(Box::new(ThreadPool {
            config,
            injector: Injector::new(),
            stealers,
            sleep_lock: Mutex::new(()),
            wakeup: Condvar::new(),
            num_sleeping: AtomicUsize::new(0),
        }));

        let barrier = Arc::new(Barrier::new(num_threads + 1));

        for (index, deque) in deques.into_iter().enumerate() {
            let worker_barrier = barrier.clone();
            let name = format!("{} {index}", thread_pool.config.get_thread_name());
            debug!("spawning managed worker with index {}", index);
            ThreadBuilder::new()
                .name(name)
                .spawn(move || managed_worker(thread_pool, index, deque, worker_barrier))
                .expect("failed to spawn worker thread");
        }

        // Wait for the workers to register themselves.
        barrier.wait();

        debug!("completed thread pool build");
        thread_pool
    }

    /// Returns the global pool, building it from [`PoolConfig::from_env`] if
    /// this is the first use.
    pub fn global() -> &'static ThreadPool {
        GLOBAL_POOL.get_or_init(|| ThreadPool::build(PoolConfig::from_env()))
    }

    /// Builds the global pool with the given configuration. This only
    /// succeeds if the global pool has not been used yet; afterwards it
    /// returns [`Error::GlobalPoolAlreadyInitialized`].
    pub fn init_global(config: PoolConfig) -> Result<&'static ThreadPool, Error> {
        let mut created = false;
        let thread_pool = GLOBAL_POOL.get_or_init(|| {
            created = true;
            ThreadPool::build(config)
        });
        if created {
            Ok(thread_pool)
        } else {
            Err(Error::GlobalPoolAlreadyInitialized)
        }
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.stealers.len()
    }

    /// Returns the surplus queued task count above which ranges stop being
    /// split.
    #[inline]
    pub fn surplus_threshold(&self) -> isize {
        self.config.get_surplus_threshold()
    }

    /// Returns true if the calling thread is one of this pool's workers.
    #[inline]
    pub fn current_thread_is_worker(&'static self) -> bool {
        Worker::map_current(|worker| ptr::eq(worker.thread_pool, self)).unwrap_or(false)
    }
}

// -----------------------------------------------------------------------------
// Thread pool scheduling

impl ThreadPool {
    /// Runs `f` on a worker of this pool and returns its result.
    ///
    /// If the calling thread is already a worker of this pool, `f` runs
    /// directly on it, so nested calls reuse the worker's stack and keep
    /// taking part in stealing. Otherwise `f` is injected into the pool and
    /// the calling thread blocks until a worker has run it.
    ///
    /// A panic in `f` is propagated to the caller.
    #[inline]
    pub(crate) fn in_worker<F, R>(&'static self, f: F) -> R
    where
        F: FnOnce(&Worker) -> R + Send,
        R: Send,
    {
        Worker::with_current(|worker| match worker {
            Some(worker) if ptr::eq(worker.thread_pool, self) => f(worker),
            _ => self.in_worker_cold(f),
        })
    }

    /// Submits `f` to the injector and blocks on its completion.
    ///
    /// This is the slow path of `in_worker` covering external calls from
    /// outside the pool. Never call this directly.
    #[cold]
    fn in_worker_cold<F, R>(&'static self, f: F) -> R
    where
        F: FnOnce(&Worker) -> R + Send,
        R: Send,
    {
        let span = trace_span!("submit");
        let _enter = span.enter();

        let stack_job = StackJob::new(f);

        // SAFETY: `stack_job` lives in this frame and is never moved. This
        // thread does not return (or unwind) until the job's signal has been
        // received, and the signal is sent as the last act of executing the
        // job, so the `JobRef` never outlives the job or anything it borrows.
        let job_ref = unsafe { stack_job.as_job_ref() };

        self.injector.push(job_ref);
        self.wake_one();

        trace!("waiting for submitted job");

        // SAFETY: The signal belongs to a job created on this thread, and only
        // this thread receives it.
        match unsafe { stack_job.signal().recv() } {
            Ok(value) => value,
            Err(payload) => unwind::resume_unwinding(payload),
        }
    }

    /// Wakes one sleeping worker, if there are any.
    ///
    /// Pairs with [`Worker::sleep`]: a pusher publishes its job and then reads
    /// the sleeper count, a sleeper publishes its count and then looks for
    /// jobs, and a fence on each side ensures at least one of them notices
    /// the other.
    #[inline]
    fn wake_one(&self) {
        fence(Ordering::SeqCst);
        if self.num_sleeping.load(Ordering::SeqCst) > 0 {
            let _guard = self.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.wakeup.notify_one();
        }
    }

    /// Wakes every sleeping worker, if there are any. Called after a job has
    /// sent its result, since the worker waiting for that result may be
    /// asleep and there is no telling which sleeper it is.
    #[inline]
    pub(crate) fn wake_all(&self) {
        fence(Ordering::SeqCst);
        if self.num_sleeping.load(Ordering::SeqCst) > 0 {
            let _guard = self.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.wakeup.notify_all();
        }
    }

    /// Returns true if there is a job in the injector or in any worker's deque.
    fn has_stealable_work(&self) -> bool {
        !self.injector.is_empty() || self.stealers.iter().any(|stealer| !stealer.is_empty())
    }
}

// -----------------------------------------------------------------------------
// Worker thread data

thread_local! {
    static WORKER_PTR: Cell<*const Worker> = const { Cell::new(ptr::null()) };
}

/// The local context of a worker thread, giving access to its deque and to
/// the pool it belongs to.
///
/// Every worker thread has exactly one `Worker`, which lives on its stack for
/// the life of the thread. Code running on a worker thread can reach it
/// through [`Worker::with_current`].
///
/// Workers have one core memory-safety guarantee: any job pushed onto a
/// worker's deque is eventually executed.
pub struct Worker {
    thread_pool: &'static ThreadPool,
    index: usize,
    deque: Deque<JobRef>,
}

/// The outcome of [`Worker::yield_now`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Yield {
    /// A job was found and executed.
    Executed,
    /// No job could be found anywhere.
    Idle,
}

impl Worker {
    /// Calls the provided closure on the thread's worker instance, if it has
    /// one.
    #[inline]
    pub fn map_current<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&Worker) -> R,
    {
        Worker::with_current(|worker| worker.map(f))
    }

    /// Looks up the current `Worker` instance from the thread local.
    ///
    /// Rust's thread locals are fairly costly, so this function is expensive.
    /// If you can avoid calling it, do so.
    #[inline]
    pub fn with_current<F, R>(f: F) -> R
    where
        F: FnOnce(Option<&Worker>) -> R,
    {
        let worker_ptr = WORKER_PTR.with(Cell::get);
        if !worker_ptr.is_null() {
            // SAFETY: `WORKER_PTR` is only set by `occupy`, always to a
            // `Worker` on the stack of the current thread which is never moved
            // and only accessed through shared references, and it is reset
            // before that `Worker` is dropped. Passing the reference to a
            // closure keeps callers from holding on to it.
            f(Some(unsafe { &*worker_ptr }))
        } else {
            f(None)
        }
    }

    /// Makes this the current thread's worker for the duration of `f`.
    fn occupy<F, R>(self, f: F) -> R
    where
        F: FnOnce(&Worker) -> R,
    {
        let span = trace_span!("occupy", index = self.index);
        let _enter = span.enter();

        let outer_ptr = WORKER_PTR.with(|ptr| ptr.replace(&self));
        let result = f(&self);
        WORKER_PTR.with(|ptr| ptr.set(outer_ptr));
        result
    }

    /// Returns the index of this worker within its pool.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the pool this worker belongs to.
    #[inline]
    pub fn thread_pool(&self) -> &'static ThreadPool {
        self.thread_pool
    }

    /// Estimates how many more jobs are queued on this worker than the idle
    /// workers could take off its hands. This is negative when there are
    /// more idle workers than queued jobs.
    #[inline]
    pub fn surplus_queued_tasks(&self) -> isize {
        let queued = self.deque.len() as isize;
        let idle = self.thread_pool.num_sleeping.load(Ordering::Relaxed) as isize;
        queued - idle
    }

    /// Pushes a job onto this worker's deque, where it can be stolen.
    #[inline]
    fn push(&self, job_ref: JobRef) {
        self.deque.push(job_ref);
        self.thread_pool.wake_one();
    }

    /// Tries to find a job to execute. Jobs from the local deque come first,
    /// then jobs stolen from other workers, then jobs injected from outside
    /// the pool. The idea is to finish what we started before we take on
    /// something new.
    #[inline]
    pub(crate) fn find_work(&self) -> Option<JobRef> {
        self.deque.pop().or_else(|| self.steal())
    }

    /// Steals a job from another worker, visiting them at increasing distance
    /// from this one, or failing that from the injector.
    #[cold]
    fn steal(&self) -> Option<JobRef> {
        let stealers = &self.thread_pool.stealers;
        let num_workers = stealers.len();
        (1..num_workers)
            .map(|distance| (self.index + distance) % num_workers)
            .find_map(|victim| steal_from(|| stealers[victim].steal()))
            .or_else(|| steal_from(|| self.thread_pool.injector.steal()))
    }

    /// Executes one job from anywhere in the pool, if there is one.
    #[inline]
    pub(crate) fn yield_now(&self) -> Yield {
        match self.find_work() {
            Some(job_ref) => {
                job_ref.execute(self);
                Yield::Executed
            }
            None => Yield::Idle,
        }
    }

    /// Runs other jobs until the provided signal is received. Whenever this
    /// thread runs out of work before the signal arrives, it sleeps like an
    /// idle worker until either the signal is sent or new work shows up.
    ///
    /// The signal must belong to a job created by this worker.
    #[inline]
    fn wait_for_signal<T>(&self, signal: &Signal<T>) -> T
    where
        T: Send,
    {
        loop {
            // SAFETY: The signal belongs to a job created by this worker, so
            // this thread is its only receiver.
            if let Some(value) = unsafe { signal.try_recv() } {
                return value;
            }

            if self.yield_now() == Yield::Idle {
                self.sleep_until(|| signal.is_sent());
            }
        }
    }

    /// Parks the worker until a job may be available.
    #[cold]
    fn sleep(&self) {
        self.sleep_until(|| false);
    }

    /// Parks the worker until a job may be available or `done` may have
    /// become true. Returns without parking if either already holds.
    ///
    /// Pairs with [`ThreadPool::wake_one`] and [`ThreadPool::wake_all`]: the
    /// sleeper count is published before the conditions are checked, so any
    /// push or send that lands after the check sees the count and notifies.
    #[cold]
    fn sleep_until(&self, done: impl Fn() -> bool) {
        let thread_pool = self.thread_pool;
        let guard = thread_pool.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
        thread_pool.num_sleeping.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        if !done() && !thread_pool.has_stealable_work() {
            trace!("worker {} going to sleep", self.index);
            let _guard = thread_pool
                .wakeup
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }

        thread_pool.num_sleeping.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Repeats a steal attempt until it either succeeds or finds nothing.
#[inline]
fn steal_from(mut attempt: impl FnMut() -> Steal<JobRef>) -> Option<JobRef> {
    loop {
        match attempt() {
            Steal::Success(job_ref) => return Some(job_ref),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

// -----------------------------------------------------------------------------
// Fork/join

impl Worker {
    /// Runs `a` on this thread while making `b` available to other workers,
    /// then returns both results once both have completed.
    ///
    /// If nobody steals `b` by the time `a` finishes, this worker runs it too.
    /// Otherwise it helps with other jobs until the thief is done. A panic in
    /// either closure is raised again here, but only after both have
    /// finished, so `b` never outlives this call.
    #[inline]
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce(&Worker) -> RA,
        B: FnOnce(&Worker) -> RB + Send,
        RB: Send,
    {
        let stack_job = StackJob::new(b);

        // SAFETY: `stack_job` is never moved while its `JobRef` is queued, and
        // this function does not return or unwind before the job has either
        // been recovered from the deque or has sent its signal. Panics from
        // `a` are captured below and re-raised only after that point.
        let job_ref = unsafe { stack_job.as_job_ref() };
        let job_ref_id = job_ref.id();
        self.push(job_ref);

        let result_a = unwind::halt_unwinding(|| a(self));

        let result_b = loop {
            // SAFETY: The job was created by this worker, which is therefore
            // its only receiver.
            if let Some(result) = unsafe { stack_job.signal().try_recv() } {
                break result;
            }

            match self.deque.pop() {
                // Nobody took it, so run it here without the indirection.
                Some(job) if job.id() == job_ref_id => {
                    // SAFETY: The ids match, so the job we just popped is
                    // `stack_job`, which therefore has not been executed.
                    let b = unsafe { stack_job.into_inner() };
                    break unwind::halt_unwinding(|| b(self));
                }
                // Our job was stolen and this one is older; it still has to
                // run, and we have nothing better to do.
                Some(job) => job.execute(self),
                None => break self.wait_for_signal(stack_job.signal()),
            }
        };

        match (result_a, result_b) {
            (Ok(value_a), Ok(value_b)) => (value_a, value_b),
            (Err(payload), _) | (_, Err(payload)) => unwind::resume_unwinding(payload),
        }
    }
}

// -----------------------------------------------------------------------------
// Thread local queries

/// Returns true if the calling thread is a worker of any pool.
pub fn current_thread_is_worker() -> bool {
    Worker::map_current(|_| ()).is_some()
}

// -----------------------------------------------------------------------------
// Main worker loop

/// This is the main loop for a worker thread. Workers run jobs from their own
/// deque, then steal, then sleep until someone pushes new work.
fn managed_worker(
    thread_pool: &'static ThreadPool,
    index: usize,
    deque: Deque<JobRef>,
    barrier: Arc<Barrier>,
) {
    trace!("starting managed worker");

    let worker = Worker {
        thread_pool,
        index,
        deque,
    };

    worker.occupy(|worker| {
        barrier.wait();
        drop(barrier);
        loop {
            match worker.find_work() {
                Some(job_ref) => job_ref.execute(worker),
                None => worker.sleep(),
            }
        }
    })
}
