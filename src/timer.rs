//! Cooperative timers for the recognizers.
//!
//! The detector does not own an event loop. Recognizers schedule deadlines
//! against this queue during a step, and the host drives expiry by calling
//! [`crate::detector::Detector::run_timers`] with its own clock. Everything
//! runs on the thread that feeds the detector.

use crate::events::GestureType;

/// Identifies one scheduled timer; returned by [`TimerQueue::schedule_after`]
/// and consumed by [`TimerQueue::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct TimerEntry {
    handle: TimerHandle,
    deadline: u32,
    gesture: GestureType,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    pending: Vec<TimerEntry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer for `gesture`, `delay_ms` after `now`.
    pub fn schedule_after(&mut self, now: u32, delay_ms: u32, gesture: GestureType) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(TimerEntry {
            handle,
            deadline: now.saturating_add(delay_ms),
            gesture,
        });
        handle
    }

    /// Cancelling an already-fired or unknown handle is a no-op.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|e| e.handle != handle);
    }

    /// Drop every pending timer belonging to `gesture`.
    pub fn cancel_gesture(&mut self, gesture: GestureType) {
        self.pending.retain(|e| e.gesture != gesture);
    }

    /// Earliest pending deadline, for hosts that want to sleep until it.
    pub fn next_deadline(&self) -> Option<u32> {
        self.pending.iter().map(|e| e.deadline).min()
    }

    /// Remove and return every timer due at `now`, ordered by deadline.
    pub(crate) fn take_due(&mut self, now: u32) -> Vec<(TimerHandle, GestureType, u32)> {
        let mut due: Vec<_> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                let e = self.pending.remove(i);
                due.push((e.handle, e.gesture, e.deadline));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|&(_, _, deadline)| deadline);
        due
    }
}
