//! Cancellation shared between a session and whoever may interrupt it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type CancelSignal = Arc<AtomicBool>;

#[must_use]
pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::Acquire)
}

#[cfg(unix)]
pub use unix::{cancel_on_signals, SignalCancelGuard};

#[cfg(unix)]
mod unix {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use signal_hook::iterator::{Handle, Signals};
    use tracing::warn;

    use super::CancelSignal;
    use crate::error::EngineError;

    /// Uninstalls the handlers and joins the listener thread on drop.
    pub struct SignalCancelGuard {
        handle: Handle,
        thread: Option<JoinHandle<()>>,
    }

    impl Drop for SignalCancelGuard {
        fn drop(&mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    /// Raises `cancel` on SIGINT or SIGTERM until the guard is dropped.
    pub fn cancel_on_signals(cancel: &CancelSignal) -> Result<SignalCancelGuard, EngineError> {
        let mut signals = Signals::new([libc::SIGINT, libc::SIGTERM])
            .map_err(|source| EngineError::SignalHandlers { source })?;
        let handle = signals.handle();
        let cancel = Arc::clone(cancel);

        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                warn!(signal, "received termination signal; cancelling engine session");
                cancel.store(true, Ordering::Release);
            }
        });

        Ok(SignalCancelGuard {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{cancel_signal, is_cancelled};
    use std::sync::atomic::Ordering;

    #[test]
    fn fresh_signal_is_clear() {
        let cancel = cancel_signal();
        assert!(!is_cancelled(&cancel));
        cancel.store(true, Ordering::Release);
        assert!(is_cancelled(&cancel));
    }
}
