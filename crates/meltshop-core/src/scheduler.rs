//! Logical clock and cooperative task queue.
//!
//! Every piece of equipment is a task identified by a [`TaskId`]. A task is
//! either suspended indefinitely (passivated) or has exactly one pending
//! resumption time. The scheduler pops resumptions in `(time, sequence)`
//! order, so tasks due at the same instant run in the order they were
//! scheduled.
//!
//! Rescheduling a task replaces its pending resumption. Replaced entries stay
//! in the heap and are skipped when popped.

use crate::fixed::{SimTime, after, minutes};
use crate::id::{CarId, CraneId, UnitId};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// A cooperative task driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Crane(CraneId),
    Car(CarId),
    Unit(UnitId),
    /// Creates new heats on the configured interval.
    HeatGenerator,
    /// Dispatches newly created heats to the first unit of their route.
    RouteProcessor,
    /// Runs the ladle maintenance cycle.
    LadleFleet,
}

/// What a task asks for after running one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Resume after the given delay.
    Hold(SimTime),
    /// Suspend until another component wakes the task.
    Passivate,
}

impl Wake {
    /// Hold for a duration given in `f64` minutes.
    pub fn after(delay: f64) -> Self {
        Wake::Hold(minutes(delay))
    }

    /// The earlier of two wake requests. `Passivate` loses to any hold.
    pub fn min(self, other: Wake) -> Wake {
        match (self, other) {
            (Wake::Hold(a), Wake::Hold(b)) => Wake::Hold(a.min(b)),
            (Wake::Hold(a), Wake::Passivate) | (Wake::Passivate, Wake::Hold(a)) => Wake::Hold(a),
            (Wake::Passivate, Wake::Passivate) => Wake::Passivate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    at: SimTime,
    seq: u64,
    task: TaskId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Discrete-event scheduler with FIFO tie-breaking.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: SimTime,
    next_seq: u64,
    heap: BinaryHeap<Reverse<Entry>>,
    /// Live resumption per task: `(time, sequence)` of the entry that counts.
    pending: HashMap<TaskId, (SimTime, u64)>,
    /// Task popped by the last `pop_due`, until its step result is applied.
    running: Option<TaskId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Resume `task` after `delay`, replacing any pending resumption.
    pub fn schedule(&mut self, task: TaskId, delay: SimTime) {
        let at = after(self.now, delay);
        self.schedule_at(task, at);
    }

    /// Resume `task` at an absolute time (clamped to now).
    pub fn schedule_at(&mut self, task: TaskId, at: SimTime) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(task, (at, seq));
        self.heap.push(Reverse(Entry { at, seq, task }));
    }

    /// Make `task` runnable now. A task already due now keeps its place in
    /// line; a task suspended or waiting for a later time is moved to now.
    pub fn wake(&mut self, task: TaskId) {
        match self.pending.get(&task) {
            Some((at, _)) if *at <= self.now => {}
            _ => self.schedule_at(task, self.now),
        }
    }

    /// Drop any pending resumption for `task`.
    pub fn passivate(&mut self, task: TaskId) {
        self.pending.remove(&task);
    }

    /// Apply the result of a task step.
    ///
    /// A resumption issued for the running task while its step ran (another
    /// component woke it) is kept: it survives `Passivate`, and a `Hold`
    /// only replaces it when the hold ends sooner.
    pub fn apply(&mut self, task: TaskId, wake: Wake) {
        let woken_while_running = if self.running == Some(task) {
            self.running = None;
            self.pending.get(&task).map(|(at, _)| *at)
        } else {
            None
        };
        match (wake, woken_while_running) {
            (Wake::Hold(delay), Some(at)) => {
                if after(self.now, delay) < at {
                    self.schedule(task, delay);
                }
            }
            (Wake::Hold(delay), None) => self.schedule(task, delay),
            (Wake::Passivate, Some(_)) => {}
            (Wake::Passivate, None) => self.passivate(task),
        }
    }

    /// Pending resumption time for a task, if any.
    pub fn pending_at(&self, task: TaskId) -> Option<SimTime> {
        self.pending.get(&task).map(|(at, _)| *at)
    }

    /// Number of tasks with a pending resumption.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Earliest live resumption time, discarding replaced entries on the way.
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(e)| e.at)
    }

    /// Pop the next task due at or before `until`, moving the clock to its
    /// resumption time.
    pub fn pop_due(&mut self, until: SimTime) -> Option<TaskId> {
        self.discard_stale();
        let Reverse(top) = self.heap.peek()?;
        if top.at > until {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.pending.remove(&entry.task);
        self.now = entry.at;
        self.running = Some(entry.task);
        Some(entry.task)
    }

    /// Move the clock forward without running anything. Never moves back.
    pub fn advance_clock(&mut self, to: SimTime) {
        self.now = self.now.max(to);
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            let live = self
                .pending
                .get(&top.task)
                .is_some_and(|&(at, seq)| at == top.at && seq == top.seq);
            if live {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> SimTime {
        minutes(v)
    }

    fn drain(s: &mut Scheduler, until: f64) -> Vec<(TaskId, f64)> {
        let mut out = Vec::new();
        while let Some(task) = s.pop_due(t(until)) {
            out.push((task, crate::fixed::to_minutes(s.now())));
        }
        out
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn pops_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::LadleFleet, t(5.0));
        s.schedule(TaskId::HeatGenerator, t(1.0));
        let order = drain(&mut s, 10.0);
        assert_eq!(
            order,
            vec![(TaskId::HeatGenerator, 1.0), (TaskId::LadleFleet, 5.0)]
        );
    }

    #[test]
    fn same_time_resumes_fifo() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::RouteProcessor, t(2.0));
        s.schedule(TaskId::HeatGenerator, t(2.0));
        s.schedule(TaskId::LadleFleet, t(2.0));
        let order: Vec<_> = drain(&mut s, 2.0).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            order,
            vec![TaskId::RouteProcessor, TaskId::HeatGenerator, TaskId::LadleFleet]
        );
    }

    #[test]
    fn pop_due_respects_horizon() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::HeatGenerator, t(10.0));
        assert_eq!(s.pop_due(t(9.0)), None);
        assert_eq!(s.now(), SimTime::ZERO);
        assert_eq!(s.pop_due(t(10.0)), Some(TaskId::HeatGenerator));
        assert_eq!(s.now(), t(10.0));
    }

    // -----------------------------------------------------------------------
    // Replacement and wake
    // -----------------------------------------------------------------------

    #[test]
    fn reschedule_replaces_pending_entry() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::HeatGenerator, t(3.0));
        s.schedule(TaskId::HeatGenerator, t(7.0));
        assert_eq!(s.pending_len(), 1);
        assert_eq!(drain(&mut s, 100.0), vec![(TaskId::HeatGenerator, 7.0)]);
    }

    #[test]
    fn wake_moves_later_resumption_to_now() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::LadleFleet, t(60.0));
        s.wake(TaskId::LadleFleet);
        assert_eq!(s.pending_at(TaskId::LadleFleet), Some(SimTime::ZERO));
        assert_eq!(drain(&mut s, 0.0).len(), 1);
    }

    #[test]
    fn wake_keeps_place_of_task_already_due() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::HeatGenerator, SimTime::ZERO);
        s.schedule(TaskId::RouteProcessor, SimTime::ZERO);
        s.wake(TaskId::HeatGenerator);
        let order: Vec<_> = drain(&mut s, 0.0).into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![TaskId::HeatGenerator, TaskId::RouteProcessor]);
    }

    #[test]
    fn passivated_task_never_runs_until_woken() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::RouteProcessor, t(1.0));
        s.passivate(TaskId::RouteProcessor);
        assert!(drain(&mut s, 50.0).is_empty());
        s.advance_clock(t(50.0));
        s.wake(TaskId::RouteProcessor);
        assert_eq!(drain(&mut s, 50.0), vec![(TaskId::RouteProcessor, 50.0)]);
    }

    #[test]
    fn apply_hold_and_passivate() {
        let mut s = Scheduler::new();
        s.apply(TaskId::HeatGenerator, Wake::after(4.0));
        assert_eq!(s.pending_at(TaskId::HeatGenerator), Some(t(4.0)));
        s.apply(TaskId::HeatGenerator, Wake::Passivate);
        assert_eq!(s.pending_at(TaskId::HeatGenerator), None);
        assert_eq!(s.next_time(), None);
    }

    #[test]
    fn wake_during_own_step_survives_passivate() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::Car(CarId::default()), t(2.0));
        let task = s.pop_due(t(2.0)).unwrap();
        // another component hands the car work while it is still stepping
        s.wake(task);
        s.apply(task, Wake::Passivate);
        assert_eq!(s.pending_at(task), Some(t(2.0)));
        assert_eq!(drain(&mut s, 2.0), vec![(task, 2.0)]);
    }

    #[test]
    fn wake_during_own_step_beats_longer_hold() {
        let mut s = Scheduler::new();
        s.schedule(TaskId::LadleFleet, t(1.0));
        let task = s.pop_due(t(1.0)).unwrap();
        s.wake(task);
        s.apply(task, Wake::after(30.0));
        assert_eq!(s.pending_at(task), Some(t(1.0)));

        // a shorter hold still wins
        let task = s.pop_due(t(1.0)).unwrap();
        s.schedule(task, t(10.0));
        s.apply(task, Wake::after(3.0));
        assert_eq!(s.pending_at(task), Some(t(4.0)));
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut s = Scheduler::new();
        s.advance_clock(t(10.0));
        s.advance_clock(t(5.0));
        assert_eq!(s.now(), t(10.0));
        s.schedule_at(TaskId::LadleFleet, t(1.0));
        assert_eq!(s.pending_at(TaskId::LadleFleet), Some(t(10.0)));
    }

    #[test]
    fn wake_min_prefers_holds() {
        assert_eq!(Wake::after(3.0).min(Wake::after(1.0)), Wake::after(1.0));
        assert_eq!(Wake::Passivate.min(Wake::after(2.0)), Wake::after(2.0));
        assert_eq!(Wake::Passivate.min(Wake::Passivate), Wake::Passivate);
    }
}
