//! Panic capture and re-raise helpers. Panics in a body or combine are caught
//! where a job runs, moved to the thread that joins the job, and raised again
//! there once every sibling has been joined.

use alloc::boxed::Box;
use alloc::string::String;
use core::any::Any;
use core::panic::AssertUnwindSafe;
use std::eprintln;
use std::panic::catch_unwind;
use std::panic::resume_unwind;
use std::process::abort;
use std::thread::Result;

/// Executes `func` and captures any panic, translating that panic into an
/// `Err` result. The caller is expected to either re-raise the payload with
/// [`resume_unwinding`] or surface it as an error, and hence `func` can be
/// treated as exception safe.
#[inline(always)]
pub fn halt_unwinding<F, R>(func: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(func))
}

#[cold]
pub fn resume_unwinding(payload: Box<dyn Any + Send>) -> ! {
    resume_unwind(payload)
}

/// Returns the message carried by a panic payload, if it is one of the two
/// types produced by `panic!`.
pub fn payload_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

/// Aborts the program when dropped. Armed around code that must not unwind
/// while stack jobs that point into the current frame are still queued.
pub struct AbortOnDrop;

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        eprintln!("stride: detected unexpected panic; aborting");
        abort();
    }
}
