//! Cooperative cancellation for long transfers.
//!
//! A [`CancelToken`] is polled between sends and during every pacing delay.
//! [`install`] hooks SIGINT so that Ctrl-C trips every token in the process;
//! the job then unwinds normally and the endpoint still gets closed.

use log::warn;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// A cheap, clonable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelToken::cancel`] was called or the process was
    /// interrupted.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || INTERRUPTED.load(Ordering::SeqCst)
    }
}

/// True if SIGINT arrived since [`install`].
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(unix)]
extern "C" fn on_sigint(_signum: libc::c_int) {
    // Only async-signal-safe work in here.
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Routes SIGINT into the process-wide cancellation flag instead of killing
/// the process, so transfers get a chance to close their endpoint.
#[cfg(unix)]
pub fn install() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler only performs an atomic store.
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        warn!("Could not install the SIGINT handler, Ctrl-C will abort immediately");
    }
}

/// No-op on platforms without POSIX signals; Ctrl-C keeps its default
/// behaviour there.
#[cfg(not(unix))]
pub fn install() {
    warn!("Interrupt handling is not supported on this platform");
}
