//! A one-shot signal used to hand the outcome of a job back to the thread
//! that joins it. The receiving thread parks on a futex while it has nothing
//! better to do.

use core::cell::UnsafeCell;

use crate::platform::*;

// -----------------------------------------------------------------------------
// States

/// No value has been sent and nobody is parked on the signal.
const IDLE: u32 = 0b00;

/// Set by the receiver when it is about to park, asking the sender to wake it.
const WAIT: u32 = 0b01;

/// Set by the sender once the value has been written.
const SENT: u32 = 0b10;

// -----------------------------------------------------------------------------
// Signal

/// Transmits a single value across threads, exactly once.
///
/// A signal has one receiving thread (the owner of the job it belongs to) and
/// one sending thread (whichever thread ends up executing the job). The
/// receiver may poll with [`Signal::try_recv`] between bouts of other work, or
/// park with [`Signal::recv`] when it has nothing else to look for.
pub struct Signal<T> {
    state: AtomicU32,
    value: UnsafeCell<Option<T>>,
}

impl<T: Send> Signal<T> {
    /// Creates a new, empty signal.
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(IDLE),
            value: UnsafeCell::new(None),
        }
    }

    /// Returns true once a value has been sent.
    #[inline(always)]
    pub fn is_sent(&self) -> bool {
        self.state.load(Ordering::Acquire) & SENT != 0
    }

    /// Receives the value if it has been sent, without blocking.
    ///
    /// # Panics
    ///
    /// Panics if the value was already received.
    ///
    /// # Safety
    ///
    /// `recv` and `try_recv` may only be called from a single thread.
    #[inline]
    pub unsafe fn try_recv(&self) -> Option<T> {
        if self.is_sent() {
            // SAFETY: The sender only touches the value before entering the
            // SENT state, and the caller guarantees there is a single
            // receiving thread, so this access is exclusive.
            Some(unsafe { self.take() })
        } else {
            None
        }
    }

    /// Receives the value, parking the thread until it has been sent.
    ///
    /// # Panics
    ///
    /// Panics if the value was already received.
    ///
    /// # Safety
    ///
    /// `recv` and `try_recv` may only be called from a single thread.
    #[cold]
    pub unsafe fn recv(&self) -> T {
        // Loop to tolerate spurious wake-ups.
        loop {
            let state = self.state.fetch_or(WAIT, Ordering::Acquire);
            if state & SENT != 0 {
                // SAFETY: As in `try_recv`.
                return unsafe { self.take() };
            }
            atomic_wait::wait(&self.state, state | WAIT);
        }
    }

    /// # Safety
    ///
    /// The SENT bit must have been observed with acquire ordering, and the
    /// caller must be the only receiving thread.
    unsafe fn take(&self) -> T {
        // SAFETY: Guaranteed by the caller.
        let slot = unsafe { &mut *self.value.get() };
        slot.take()
            .expect("value received more than once over the same signal")
    }

    /// Sends a value to the receiving thread.
    ///
    /// # Panics
    ///
    /// Panics if a value has already been sent.
    ///
    /// # Safety
    ///
    /// Sending may wake the receiver, which may then deallocate the signal.
    /// This therefore takes `*const Self` instead of `&self`; the caller must
    /// ensure the pointer is valid on entry and not invalidated by anything
    /// other than this call.
    #[inline(always)]
    pub unsafe fn send(signal: *const Self, value: T) {
        // SAFETY: The pointer is valid on entry and nothing has been published
        // yet that would let the receiver free it.
        let this = unsafe { &*signal };

        if this.state.load(Ordering::Relaxed) & SENT != 0 {
            panic!("attempted to send value over signal, but signal has already been sent");
        }

        // SAFETY: The receiver only reads the value after observing SENT,
        // which we have not set yet, so we have exclusive access.
        unsafe { *this.value.get() = Some(value) };

        // Setting SENT may let the receiver return and free the signal; only
        // the state word may be touched after this point.
        let state = this.state.fetch_or(SENT, Ordering::Release);
        if state & WAIT != 0 {
            // SAFETY: With WAIT set the receiver is parked (or about to park)
            // and cannot have freed the signal yet.
            atomic_wait::wake_one(unsafe { &(*signal).state });
        }
    }
}

impl<T: Send> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: References to signals are shared between the sending and the
// receiving thread, and the signal moves a `T` between them, so `T: Send` is
// both necessary and sufficient.
unsafe impl<T: Send> Sync for Signal<T> {}
