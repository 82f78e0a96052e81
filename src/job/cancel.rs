//! Cooperative cancellation, checked by job threads at file boundaries.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancel flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// The underlying flag, for `signal_hook::flag::register`.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Cancel on SIGINT and SIGTERM. Registration failures are reported, not fatal.
    #[cfg(feature = "cli")]
    pub fn cancel_on_signals(&self) {
        use signal_hook::consts::{SIGINT, SIGTERM};
        for (name, signal) in [("SIGINT", SIGINT), ("SIGTERM", SIGTERM)] {
            if let Err(e) = signal_hook::flag::register(signal, self.flag()) {
                eprintln!("[ADC-SIGNAL] failed to register {name}: {e}");
            }
        }
    }
}
