//! Cooperative stop signal shared between the host and the capture loop.
//!
//! The host (timeout timer, Ctrl-C listener, exhausted event source) raises
//! the signal; the capturer only observes it at its yield point. The first
//! reason raised wins and later raises are ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Why the host stopped the capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Configured run timeout elapsed.
    Timeout,
    /// External stop request (Ctrl-C, supervisor).
    Interrupted,
    /// The event source has no more events.
    EndOfInput,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Timeout => "timeout",
            StopReason::Interrupted => "interrupted",
            StopReason::EndOfInput => "end of input",
        };
        f.write_str(text)
    }
}

struct Inner {
    reason: Mutex<Option<StopReason>>,
    notify: Notify,
}

/// Clonable cancellation token.
#[derive(Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                reason: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Raises the signal. Returns `false` if it was already raised.
    pub fn raise(&self, reason: StopReason) -> bool {
        {
            let mut current = self.inner.reason.lock();
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
        }
        self.inner.notify.notify_waiters();
        true
    }

    #[inline]
    pub fn reason(&self) -> Option<StopReason> {
        *self.inner.reason.lock()
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the signal has been raised.
    pub async fn raised(&self) -> StopReason {
        loop {
            // Registered before the check so a concurrent raise is not missed.
            let notified = self.inner.notify.notified();
            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("reason", &self.reason())
            .finish()
    }
}
