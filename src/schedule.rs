//! Time source and deferred work queue.
//!
//! Structural edits sometimes need a follow-up step (restore a selection,
//! re-enable history capture) that must run after the edit has settled. The
//! queue keeps those steps in due order; a host either pumps it from its tick
//! loop or flushes it immediately.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::DelayConfig;

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    NextFrame,
    Short,
    Medium,
    Long,
    Settle,
}

impl Delay {
    pub fn duration(self, delays: &DelayConfig) -> Duration {
        let millis = match self {
            Delay::NextFrame => delays.next_frame_ms,
            Delay::Short => delays.short_ms,
            Delay::Medium => delays.medium_ms,
            Delay::Long => delays.long_ms,
            Delay::Settle => delays.settle_ms,
        };
        Duration::from_millis(millis)
    }
}

struct Pending<T> {
    due: Instant,
    sequence: u64,
    task: T,
}

pub struct Scheduler<T> {
    pending: Vec<Pending<T>>,
    sequence: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            sequence: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn schedule(&mut self, now: Instant, delay: Duration, task: T) {
        self.sequence += 1;
        self.pending.push(Pending {
            due: now + delay,
            sequence: self.sequence,
            task,
        });
    }

    /// Removes and returns every task due at `now`, earliest first. Tasks
    /// with equal due times come out in scheduling order.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        let mut idx = 0;
        while idx < self.pending.len() {
            if self.pending[idx].due <= now {
                due.push(self.pending.remove(idx));
            } else {
                idx += 1;
            }
        }
        due.sort_by_key(|pending| (pending.due, pending.sequence));
        due.into_iter().map(|pending| pending.task).collect()
    }

    /// Removes every task regardless of due time, in due order.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut all = std::mem::take(&mut self.pending);
        all.sort_by_key(|pending| (pending.due, pending.sequence));
        all.into_iter().map(|pending| pending.task).collect()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|pending| pending.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_come_out_in_due_order() {
        let clock = ManualClock::new();
        let delays = DelayConfig::default();
        let mut scheduler = Scheduler::default();
        let now = clock.now();
        scheduler.schedule(now, Delay::Settle.duration(&delays), "resume");
        scheduler.schedule(now, Delay::Medium.duration(&delays), "select");
        scheduler.schedule(now, Delay::Short.duration(&delays), "focus");

        clock.advance(Duration::from_millis(60));
        assert_eq!(scheduler.take_due(clock.now()), vec!["focus", "select"]);
        assert_eq!(scheduler.len(), 1);

        clock.advance(Duration::from_millis(100));
        assert_eq!(scheduler.take_due(clock.now()), vec!["resume"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn equal_due_times_keep_scheduling_order() {
        let now = Instant::now();
        let mut scheduler = Scheduler::default();
        scheduler.schedule(now, Duration::ZERO, 1);
        scheduler.schedule(now, Duration::ZERO, 2);
        scheduler.schedule(now, Duration::ZERO, 3);
        assert_eq!(scheduler.drain_all(), vec![1, 2, 3]);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = other.now();
        clock.advance(Duration::from_secs(1));
        assert_eq!(other.now() - start, Duration::from_secs(1));
    }
}
