//! A resettable boolean signal threads can block on.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Set/clear flag with blocking waits, shared between the control API and
/// the playback thread.
#[derive(Debug, Default)]
pub struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new(initially_set: bool) -> Self {
        Self {
            flag: Mutex::new(initially_set),
            cond: Condvar::new(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, bool> {
        self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the signal and wake every waiter.
    pub fn set(&self) {
        *self.guard() = true;
        self.cond.notify_all();
    }

    pub fn clear(&self) {
        *self.guard() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.guard()
    }

    /// Block until the signal is raised.
    pub fn wait(&self) {
        let guard = self.guard();
        let _guard = self
            .cond
            .wait_while(guard, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Block until the signal is raised or `timeout` elapses.
    /// Returns whether the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.guard();
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
