use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// The process-wide "a macro is pressing keys" lock.
///
/// Unlike a plain mutex, the guard is owned and `Send`, so a dispatcher can
/// take the lock on the input thread and hand it to the worker that plays the
/// macro.
#[derive(Debug, Default)]
pub struct ExecLock {
    busy: Mutex<bool>,
    freed: Condvar,
}

impl ExecLock {
    /// A free lock, shared.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Non-blocking check.
    pub fn is_held(&self) -> bool {
        *self.busy.lock()
    }

    /// Block until the lock is free, then take it.
    pub fn acquire(self: &Arc<Self>) -> ExecGuard {
        let mut busy = self.busy.lock();
        while *busy {
            self.freed.wait(&mut busy);
        }
        *busy = true;
        ExecGuard { lock: self.clone() }
    }

    /// Take the lock if it is free.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ExecGuard> {
        let mut busy = self.busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        Some(ExecGuard { lock: self.clone() })
    }
}

/// Holds the [`ExecLock`]; released on drop, including during a panic.
#[derive(Debug)]
pub struct ExecGuard {
    lock: Arc<ExecLock>,
}

impl Drop for ExecGuard {
    fn drop(&mut self) {
        *self.lock.busy.lock() = false;
        self.lock.freed.notify_one();
    }
}
