//! Cooperative safepoints
//!
//! Managed threads poll at method entry, at loop back-edges and while
//! waiting for a compilation. A pause request parks every polling thread
//! until `resume`.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct State {
    pause_requested: bool,
    parked: usize,
}

/// Safepoint shared by the threads of one runtime
#[derive(Debug, Default)]
pub struct Safepoint {
    state: Mutex<State>,
    changed: Condvar,
    polls: AtomicU64,
}

impl Safepoint {
    /// Create a safepoint with no pause pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every thread to park at its next poll
    pub fn request_pause(&self) {
        self.state.lock().pause_requested = true;
    }

    /// Let parked threads continue
    pub fn resume(&self) {
        self.state.lock().pause_requested = false;
        self.changed.notify_all();
    }

    /// Whether a pause is pending
    pub fn is_pause_requested(&self) -> bool {
        self.state.lock().pause_requested
    }

    /// Check for a pause request, blocking while one is pending
    pub fn poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if !state.pause_requested {
            return;
        }
        state.parked += 1;
        self.changed.notify_all();
        while state.pause_requested {
            self.changed.wait(&mut state);
        }
        state.parked -= 1;
    }

    /// Threads currently parked
    pub fn parked(&self) -> usize {
        self.state.lock().parked
    }

    /// Block until at least `count` threads are parked, or `timeout` passes
    pub fn wait_for_parked(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.parked < count {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.parked >= count;
            }
        }
        true
    }

    /// Polls performed so far
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }
}
