//! Named deferred tasks with one deadline slot each.

use embassy_time::{Duration, Instant};

/// Deferred work items. Declaration order breaks ties between equal deadlines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// Second half of a suspend pulse.
    PulseRelease,
    /// Cast the enable vote after a protocol online change.
    EnableVote,
    /// Leave Wait if nobody moved the state machine on.
    WaitTimeout,
    /// Control loop tick.
    Tick,
    /// Session summary upload.
    Track,
}

const TASK_COUNT: usize = 5;

const TASKS: [Task; TASK_COUNT] = [
    Task::PulseRelease,
    Task::EnableVote,
    Task::WaitTimeout,
    Task::Tick,
    Task::Track,
];

impl Task {
    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    slots: [Option<Instant>; TASK_COUNT],
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { slots: [None; TASK_COUNT] }
    }

    /// Arm `task` to run `delay` after `now`. Does nothing if it is already
    /// pending; returns whether it was armed.
    pub fn schedule(&mut self, task: Task, now: Instant, delay: Duration) -> bool {
        let slot = &mut self.slots[task.slot()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(now + delay);
        true
    }

    /// Drop a pending `task`; returns whether one was pending.
    pub fn cancel(&mut self, task: Task) -> bool {
        self.slots[task.slot()].take().is_some()
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.slots[task.slot()].is_some()
    }

    pub fn deadline(&self, task: Task) -> Option<Instant> {
        self.slots[task.slot()]
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().min().copied()
    }

    /// Remove and return the earliest task due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let mut best: Option<(Task, Instant)> = None;
        for task in TASKS {
            if let Some(at) = self.slots[task.slot()] {
                if at <= now && best.map_or(true, |(_, b)| at < b) {
                    best = Some((task, at));
                }
            }
        }
        let (task, _) = best?;
        self.slots[task.slot()] = None;
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn schedule_is_noop_while_pending() {
        let mut s = Scheduler::new();
        assert!(s.schedule(Task::Tick, at(0), Duration::from_millis(1000)));
        assert!(!s.schedule(Task::Tick, at(0), Duration::from_millis(10)));
        assert_eq!(s.deadline(Task::Tick), Some(at(1000)));
    }

    #[test]
    fn pop_due_returns_earliest_then_declaration_order() {
        let mut s = Scheduler::new();
        s.schedule(Task::Track, at(0), Duration::from_millis(5));
        s.schedule(Task::Tick, at(0), Duration::from_millis(5));
        s.schedule(Task::WaitTimeout, at(0), Duration::from_millis(3));
        assert_eq!(s.pop_due(at(2)), None);
        assert_eq!(s.pop_due(at(10)), Some(Task::WaitTimeout));
        assert_eq!(s.pop_due(at(10)), Some(Task::Tick));
        assert_eq!(s.pop_due(at(10)), Some(Task::Track));
        assert_eq!(s.pop_due(at(10)), None);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn cancel_clears_slot() {
        let mut s = Scheduler::new();
        s.schedule(Task::WaitTimeout, at(100), Duration::from_millis(1000));
        s.schedule(Task::Tick, at(100), Duration::from_millis(2000));
        assert_eq!(s.next_deadline(), Some(at(1100)));
        assert!(s.cancel(Task::WaitTimeout));
        assert!(!s.cancel(Task::WaitTimeout));
        assert!(!s.is_pending(Task::WaitTimeout));
        assert_eq!(s.next_deadline(), Some(at(2100)));
    }
}
