use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal handed to every task.
///
/// Raising it is monotonic: once cancelled, a token stays cancelled and keeps
/// the first reason it was given. Tokens are cheap to clone and are never
/// reused across tasks.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    reason: Mutex<Option<String>>,
    raised: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, reason: &str) {
        let mut slot = self.lock();
        if slot.is_none() {
            *slot = Some(reason.to_string());
            self.inner.raised.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Block for up to `timeout`; returns `true` if the token was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        while slot.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            slot = match self.inner.raised.wait_timeout(slot, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.inner.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}
