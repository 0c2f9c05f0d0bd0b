//! Error types returned by loops and reductions.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::String;
use core::any::Any;
use core::fmt;

use crate::platform::*;
use crate::unwind;

// -----------------------------------------------------------------------------
// Range errors

/// A range description was rejected before any work started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeError {
    /// `begin` was not strictly less than `end`.
    EmptyRange {
        /// The rejected begin index.
        begin: i64,
        /// The rejected end index.
        end: i64,
    },
    /// The step was zero or negative.
    NonPositiveStep(i64),
    /// The chunk size was zero or negative.
    NonPositiveChunk(i64),
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::EmptyRange { begin, end } => {
                write!(f, "begin must be less than end (got begin={begin}, end={end})")
            }
            RangeError::NonPositiveStep(step) => write!(f, "step must be positive (got {step})"),
            RangeError::NonPositiveChunk(chunk) => {
                write!(f, "chunk must be positive (got {chunk})")
            }
        }
    }
}

impl core::error::Error for RangeError {}

// -----------------------------------------------------------------------------
// Computation errors

/// A body or combine function panicked while a loop or reduction was running.
///
/// Every job forked by the failing call has been joined by the time this is
/// returned, and the pool that ran it can be used again.
///
/// The error is `Send + Sync`, so it can be boxed into
/// `Box<dyn Error + Send + Sync>`.
pub struct ComputationError {
    message: Option<String>,
    /// Only reached through `self`, the lock just makes the error `Sync`.
    payload: Mutex<Box<dyn Any + Send>>,
}

impl ComputationError {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: unwind::payload_message(&*payload).map(ToOwned::to_owned),
            payload: Mutex::new(payload),
        }
    }

    /// Returns the panic message, when the panic carried a string.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the raw panic payload.
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises the original panic again on the current thread.
    pub fn resume(self) -> ! {
        unwind::resume_unwinding(self.into_payload())
    }
}

impl fmt::Debug for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationError")
            .field("message", &self.message())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "parallel computation panicked: {message}"),
            None => f.write_str("parallel computation panicked"),
        }
    }
}

impl core::error::Error for ComputationError {}

// -----------------------------------------------------------------------------
// Top-level error

/// The error returned by the free loop and reduce functions.
#[derive(Debug)]
pub enum Error {
    /// The range arguments were invalid; the body was never called.
    Argument(RangeError),
    /// A body or combine function panicked.
    Computation(ComputationError),
    /// [`ThreadPool::init_global`](crate::ThreadPool::init_global) was called
    /// after the global pool had already been created.
    GlobalPoolAlreadyInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Argument(err) => write!(f, "invalid range: {err}"),
            Error::Computation(err) => fmt::Display::fmt(err, f),
            Error::GlobalPoolAlreadyInitialized => {
                f.write_str("the global thread pool has already been initialized")
            }
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Argument(err) => Some(err),
            Error::Computation(err) => Some(err),
            Error::GlobalPoolAlreadyInitialized => None,
        }
    }
}

impl From<RangeError> for Error {
    fn from(err: RangeError) -> Self {
        Error::Argument(err)
    }
}

impl From<ComputationError> for Error {
    fn from(err: ComputationError) -> Self {
        Error::Computation(err)
    }
}
