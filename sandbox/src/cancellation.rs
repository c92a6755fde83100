//! Process-wide cancellation flag, flipped by a `SIGTERM`/`SIGINT` handler installed once at
//! process start.
//!
//! One flag serves the whole process: the Test Runner checks it between test cases and the
//! monitor thread started by [`crate::Sandbox::run`] checks it on its polling interval, so a
//! case that is mid-flight when the signal arrives is killed rather than left orphaned.

use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

static CANCELLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: c_int) {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Install the `SIGTERM`/`SIGINT` handler. Safe to call more than once.
pub fn install_handler() -> crate::Result<()> {
    unsafe {
        signal::signal(Signal::SIGTERM, SigHandler::Handler(on_signal))?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(on_signal))?;
    }
    Ok(())
}

/// Whether a cancellation signal has been observed since the last [`reset`].
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Clear the flag. Exposed for tests that drive cancellation-aware loops in isolation; production
/// code never needs to call this since the flag is meant to latch for the rest of the process.
pub fn reset() {
    CANCELLED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_latches_until_reset() {
        reset();
        assert!(!is_cancelled());
        CANCELLED.store(true, Ordering::SeqCst);
        assert!(is_cancelled());
        reset();
        assert!(!is_cancelled());
    }
}
