//! Virtual timer facility
//!
//! The port arms one-shot timers through [`TimerService`] and expects the host
//! to call [`Serial16550::on_timer`](crate::Serial16550::on_timer) with the
//! returned handle once the deadline passes. Handles are never reused, so a
//! late expiry for a cancelled timer is recognized and ignored.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

pub trait TimerService: Send {
    /// Current virtual time.
    fn now(&self) -> Duration;

    /// Arms a one-shot timer expiring `delay` from now.
    fn arm(&mut self, delay: Duration) -> TimerHandle;

    /// Disarms a timer. Cancelling an expired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_handle: u64,
    queue: BTreeSet<(Duration, TimerHandle)>,
    deadlines: HashMap<TimerHandle, Duration>,
}

/// Deterministic virtual clock. Time only moves when the host advances it.
///
/// Clones share the same clock, so the host keeps one clone to drive time
/// and hands another to the port.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    state: Arc<Mutex<ClockState>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Deadline of the earliest armed timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.state.lock().queue.first().map(|&(deadline, _)| deadline)
    }

    pub fn armed(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to
    /// its deadline.
    pub fn expire_next(&self, until: Duration) -> Option<TimerHandle> {
        let mut state = self.state.lock();
        let &(deadline, handle) = state.queue.first()?;
        if deadline > until {
            return None;
        }
        state.queue.remove(&(deadline, handle));
        state.deadlines.remove(&handle);
        state.now = state.now.max(deadline);
        Some(handle)
    }

    /// Fires every timer due up to `until` in deadline order, including
    /// timers armed by `f` itself, then leaves the clock at `until`.
    pub fn run_until(&self, until: Duration, mut f: impl FnMut(TimerHandle)) {
        while let Some(handle) = self.expire_next(until) {
            f(handle);
        }
        let mut state = self.state.lock();
        state.now = state.now.max(until);
    }

    /// [`run_until`](Self::run_until) relative to the current time.
    pub fn advance(&self, by: Duration, f: impl FnMut(TimerHandle)) {
        let until = self.now() + by;
        self.run_until(until, f);
    }
}

impl TimerService for VirtualClock {
    fn now(&self) -> Duration {
        VirtualClock::now(self)
    }

    fn arm(&mut self, delay: Duration) -> TimerHandle {
        let mut state = self.state.lock();
        let handle = TimerHandle(state.next_handle);
        state.next_handle += 1;
        let deadline = state.now.saturating_add(delay);
        state.queue.insert((deadline, handle));
        state.deadlines.insert(handle, deadline);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&handle) {
            state.queue.remove(&(deadline, handle));
        }
    }
}
