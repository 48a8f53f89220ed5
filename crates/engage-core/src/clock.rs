//! Deterministic timers.
//!
//! Timers carry a payload instead of a callback. Whoever drives the scheduler
//! pops due payloads and dispatches them, which keeps every state machine
//! single-threaded and lets tests advance virtual time exactly.

use std::collections::{BTreeMap, HashMap};

/// Milliseconds on the scheduler's timeline. Origin is arbitrary (page load
/// for the virtual driver, process start for the real-time one).
pub type Millis = u64;

/// Identifies one armed timer. Cancelling through a stale handle is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Fixed-delay timer facility.
pub trait Scheduler<T> {
    /// Current time on this scheduler's timeline.
    fn now(&self) -> Millis;

    /// Arm a timer that delivers `payload` once `delay` ms have elapsed.
    fn after(&mut self, delay: Millis, payload: T) -> TimerHandle;

    /// Disarm a timer. Returns `true` only if it was still pending; cancelling
    /// a fired or already-cancelled timer returns `false` and changes nothing.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

/// Timer queue over virtual time.
///
/// Ordering: earliest due first; timers due at the same instant fire in the
/// order they were armed.
#[derive(Debug)]
pub struct VirtualScheduler<T> {
    now: Millis,
    next_seq: u64,
    queue: BTreeMap<(Millis, u64), T>,
    due_at: HashMap<u64, Millis>,
}

impl<T> VirtualScheduler<T> {
    pub fn new(now: Millis) -> Self {
        Self {
            now,
            next_seq: 0,
            queue: BTreeMap::new(),
            due_at: HashMap::new(),
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to its
    /// due time. Returns `None` once nothing else is due by `until`.
    pub fn pop_due(&mut self, until: Millis) -> Option<(TimerHandle, T)> {
        let (&(due, seq), _) = self.queue.first_key_value()?;
        if due > until {
            return None;
        }
        let payload = self.queue.remove(&(due, seq))?;
        self.due_at.remove(&seq);
        self.now = self.now.max(due);
        Some((TimerHandle(seq), payload))
    }

    /// Move the clock forward without firing anything. Time never goes back.
    pub fn set_now(&mut self, now: Millis) {
        self.now = self.now.max(now);
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<Millis> {
        self.queue.first_key_value().map(|(&(due, _), _)| due)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_at.contains_key(&handle.0)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Disarm every pending timer.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        self.due_at.clear();
        n
    }
}

impl<T> Scheduler<T> for VirtualScheduler<T> {
    fn now(&self) -> Millis {
        self.now
    }

    fn after(&mut self, delay: Millis, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let due = self.now.saturating_add(delay);
        self.queue.insert((due, seq), payload);
        self.due_at.insert(seq, due);
        TimerHandle(seq)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.due_at.remove(&handle.0) {
            Some(due) => self.queue.remove(&(due, handle.0)).is_some(),
            None => false,
        }
    }
}

/// Timers armed by the engagement tracker and its components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timer {
    /// Minimum splash duration has elapsed.
    SplashMinimum,
    /// Host never reported its load; proceed anyway.
    LoadFallback,
    /// Splash gone, reveal the content.
    Reveal,
    /// Show the hint popup.
    Hint,
    /// Pointer held long enough.
    Hold,
    /// Show the discovery confirmation after the reality shift.
    Discovery,
    /// Restore the remembered scroll position.
    ScrollRestore,
    /// Close the small-screen alert.
    MobileAlert,
    /// Try music autoplay a second time.
    AutoplayRetry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut s = VirtualScheduler::new(0);
        s.after(300, "c");
        s.after(100, "a");
        s.after(200, "b");

        let fired: Vec<_> = std::iter::from_fn(|| s.pop_due(1_000).map(|(_, p)| p)).collect();
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert_eq!(s.now(), 300);
    }

    #[test]
    fn test_same_instant_fires_in_arming_order() {
        let mut s = VirtualScheduler::new(0);
        s.after(50, 1);
        s.after(50, 2);
        s.after(50, 3);
        let fired: Vec<_> = std::iter::from_fn(|| s.pop_due(50).map(|(_, p)| p)).collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn test_not_due_yet() {
        let mut s = VirtualScheduler::new(0);
        s.after(100, ());
        assert!(s.pop_due(99).is_none());
        assert!(s.pop_due(100).is_some());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = VirtualScheduler::new(0);
        let h = s.after(10, ());
        assert!(s.is_pending(h));
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(s.pop_due(100).is_none());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut s = VirtualScheduler::new(0);
        let h = s.after(10, ());
        let other = s.after(20, ());
        assert!(s.pop_due(10).is_some());
        assert!(!s.cancel(h));
        assert!(s.is_pending(other));
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut s = VirtualScheduler::new(1_000);
        s.after(500, ());
        assert_eq!(s.next_due(), Some(1_500));
        s.set_now(400);
        assert_eq!(s.now(), 1_000, "clock must not run backwards");
    }

    #[test]
    fn test_cancel_all() {
        let mut s = VirtualScheduler::new(0);
        s.after(1, ());
        s.after(2, ());
        assert_eq!(s.cancel_all(), 2);
        assert_eq!(s.pending(), 0);
        assert!(s.next_due().is_none());
    }
}
