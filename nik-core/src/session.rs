//! Process-wide session flag.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Slice used by [`SessionState::sleep`] between flag checks.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// `running` flag shared by every loop in the process.
///
/// Initialised `true`. Its single transition to `false` (exit phrase or
/// interrupt) is the termination signal for voice capture, the task runner
/// and the dispatch loop. Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct SessionState {
    running: Arc<AtomicBool>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flip the flag to `false`. Returns `true` only for the call that actually
    /// performed the transition.
    pub fn terminate(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Sleep for up to `duration`, waking early once the session ends.
    ///
    /// Returns `false` if the session ended during the wait.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
        false
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
