//! Cooperative flow control between parser and serialiser.
//!
//! A two-state machine (`open` / `paused`) with a wake primitive. The
//! parser raises the signal to pause the serialiser; the serialiser polls
//! it before emitting each chunk and blocks while it is raised. Lowering
//! wakes every waiter. The signal is always passed explicitly; there is
//! no module-level instance.

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub struct Signal {
    paused: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the writer to pause before its next chunk.
    pub fn raise(&self) {
        *self.paused.lock() = true;
    }

    /// Allow the writer to continue; wakes all waiters.
    pub fn lower(&self) {
        let mut paused = self.paused.lock();
        *paused = false;
        self.cond.notify_all();
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.paused.lock()
    }

    /// Block the caller until the signal is lowered. Returns immediately
    /// when it is not raised.
    pub fn wait_while_raised(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.cond.wait(&mut paused);
        }
    }
}
