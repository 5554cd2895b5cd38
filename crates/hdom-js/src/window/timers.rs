//! Timer APIs
//!
//! Backs setTimeout and setInterval. Timers are owned by one session and
//! fire in due order when the session loop calls
//! [`TimerManager::take_ready`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::realm::JsHandle;

/// Intervals shorter than this are clamped
const MIN_INTERVAL: Duration = Duration::from_millis(4);

/// Timer entry
#[derive(Debug, Clone)]
pub struct Timer {
    pub id: u32,
    pub handle: JsHandle,
    pub delay: Duration,
    pub repeat: bool,
    pub due: Instant,
}

/// Timer manager
#[derive(Debug)]
pub struct TimerManager {
    next_id: u32,
    timers: BTreeMap<u32, Timer>,
}

impl Default for TimerManager {
    fn default() -> Self {
        Self {
            next_id: 1,
            timers: BTreeMap::new(),
        }
    }
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, handle: JsHandle, delay: Duration, repeat: bool, now: Instant) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(
            id,
            Timer {
                id,
                handle,
                delay,
                repeat,
                due: now + delay,
            },
        );
        id
    }

    /// Add a timeout
    pub fn set_timeout(&mut self, handle: JsHandle, delay: Duration, now: Instant) -> u32 {
        self.add(handle, delay, false, now)
    }

    /// Add an interval
    pub fn set_interval(&mut self, handle: JsHandle, delay: Duration, now: Instant) -> u32 {
        self.add(handle, delay.max(MIN_INTERVAL), true, now)
    }

    /// Clear a timer, returning its callback so it can be released
    pub fn clear(&mut self, id: u32) -> Option<JsHandle> {
        self.timers.remove(&id).map(|t| t.handle)
    }

    /// Timers due at `now`, earliest first. Timeouts are removed, intervals
    /// are rescheduled one period after `now`.
    pub fn take_ready(&mut self, now: Instant) -> Vec<Timer> {
        let mut ready: Vec<Timer> = self
            .timers
            .values()
            .filter(|t| t.due <= now)
            .cloned()
            .collect();
        ready.sort_by_key(|t| (t.due, t.id));

        for timer in &ready {
            if timer.repeat {
                if let Some(t) = self.timers.get_mut(&timer.id) {
                    t.due = now + t.delay;
                }
            } else {
                self.timers.remove(&timer.id);
            }
        }
        ready
    }

    /// Whether the timer is still scheduled
    pub fn is_active(&self, id: u32) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.timers.is_empty()
    }

    /// When the earliest timer is due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Drop every timer, returning the callbacks to release
    pub fn clear_all(&mut self) -> Vec<JsHandle> {
        std::mem::take(&mut self.timers)
            .into_values()
            .map(|t| t.handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_manager() {
        let mut tm = TimerManager::new();
        let now = Instant::now();

        let id1 = tm.set_timeout(JsHandle(1), Duration::from_millis(100), now);
        let id2 = tm.set_timeout(JsHandle(2), Duration::from_millis(200), now);
        assert!(tm.has_pending());

        assert_eq!(tm.clear(id1), Some(JsHandle(1)));
        assert!(tm.has_pending());
        assert_eq!(tm.clear(id1), None);

        tm.clear(id2);
        assert!(!tm.has_pending());
    }

    #[test]
    fn test_ready_in_due_order() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.set_timeout(JsHandle(1), Duration::from_millis(30), now);
        tm.set_timeout(JsHandle(2), Duration::from_millis(10), now);
        tm.set_timeout(JsHandle(3), Duration::from_millis(500), now);

        assert!(tm.take_ready(now).is_empty());
        let ready: Vec<_> = tm
            .take_ready(now + Duration::from_millis(50))
            .into_iter()
            .map(|t| t.handle)
            .collect();
        assert_eq!(ready, vec![JsHandle(2), JsHandle(1)]);
        assert_eq!(tm.next_deadline(), Some(now + Duration::from_millis(500)));
    }

    #[test]
    fn test_interval_reschedules() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        let id = tm.set_interval(JsHandle(7), Duration::ZERO, now);

        let later = now + Duration::from_millis(5);
        assert_eq!(tm.take_ready(later).len(), 1);
        assert!(tm.is_active(id));
        assert_eq!(tm.next_deadline(), Some(later + MIN_INTERVAL));

        assert_eq!(tm.clear_all(), vec![JsHandle(7)]);
        assert!(!tm.has_pending());
    }
}
