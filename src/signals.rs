//! Deferred-termination signal handling (`spec.md` §5).
//!
//! Interrupt, termination, abort, and hangup all install the same handler: if
//! `in_critical` is down, exit immediately; if it is up, set `pending` and
//! return, letting the critical section finish and observe `pending` itself
//! afterward. The handler body runs in signal-handler context, so it touches
//! only atomics and calls `libc::_exit`, which (unlike `std::process::exit`)
//! is async-signal-safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGABRT, SIGHUP, SIGINT, SIGTERM};

use crate::error::{ImagepileError, Result};

/// Shared flags the registered handlers and the critical section both touch.
pub struct TerminationHandlers {
    in_critical: Arc<AtomicBool>,
    pending: Arc<AtomicBool>,
}

impl TerminationHandlers {
    /// Install handlers for SIGINT, SIGTERM, SIGHUP, and (where the platform
    /// allows a handler for it) SIGABRT, matching the original tool's
    /// `sigaction` registration list.
    pub fn install() -> Result<Self> {
        let in_critical = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicBool::new(false));

        for signum in [SIGINT, SIGTERM, SIGHUP, SIGABRT] {
            let in_critical = Arc::clone(&in_critical);
            let pending = Arc::clone(&pending);
            unsafe {
                signal_hook::low_level::register(signum, move || {
                    if in_critical.load(Ordering::SeqCst) {
                        pending.store(true, Ordering::SeqCst);
                    } else {
                        libc::_exit(1);
                    }
                })
                .map_err(|e| ImagepileError::Signal(e.to_string()))?;
            }
        }

        Ok(Self { in_critical, pending })
    }

    /// Raise the flag around a pool-append/index-append pair.
    pub fn enter_critical(&self) {
        self.in_critical.store(true, Ordering::SeqCst);
    }

    /// Lower the flag once the critical section has completed.
    pub fn exit_critical(&self) {
        self.in_critical.store(false, Ordering::SeqCst);
    }

    /// Whether a signal arrived during the last critical section and is
    /// waiting for the caller to flush and exit.
    pub fn pending_termination(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_section_flag_round_trips() {
        let in_critical = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicBool::new(false));
        let handlers = TerminationHandlers { in_critical, pending };
        assert!(!handlers.pending_termination());
        handlers.enter_critical();
        handlers.exit_critical();
        assert!(!handlers.pending_termination());
    }
}
