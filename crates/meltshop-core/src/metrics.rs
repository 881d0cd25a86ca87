//! Per-equipment time accounting and the sample type the analyzer consumes.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Length of the wait/cycle histories kept by each unit.
pub const HISTORY_LEN: usize = 20;

/// Which accumulator elapsed time is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    Idle,
    Busy,
    Waiting,
    Blocked,
}

/// Accumulated minutes per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTotals {
    pub idle: f64,
    pub busy: f64,
    pub waiting: f64,
    pub blocked: f64,
}

impl StateTotals {
    pub fn total(&self) -> f64 {
        self.idle + self.busy + self.waiting + self.blocked
    }

    /// Fraction of time busy or waiting on a full unit.
    pub fn utilization(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (self.busy + self.waiting) / total
    }

    /// Working time (busy or waiting, as in [`Self::utilization`]) over
    /// working plus idle, as a percentage. Blocked time is left out.
    pub fn availability_pct(&self) -> f64 {
        let working = self.busy + self.waiting;
        let denom = working + self.idle;
        if denom <= 0.0 {
            return 0.0;
        }
        working / denom * 100.0
    }
}

/// Charges elapsed time to the bucket active since the last transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClock {
    current: TimeBucket,
    since: f64,
    totals: StateTotals,
}

impl StateClock {
    pub fn new(start: f64) -> Self {
        Self {
            current: TimeBucket::Idle,
            since: start,
            totals: StateTotals::default(),
        }
    }

    pub fn current(&self) -> TimeBucket {
        self.current
    }

    /// Close the running interval at `now` and switch buckets.
    pub fn transition(&mut self, to: TimeBucket, now: f64) {
        self.charge(now);
        self.current = to;
    }

    /// Totals including the still-open interval up to `now`.
    pub fn totals_at(&self, now: f64) -> StateTotals {
        let mut totals = self.totals;
        let open = (now - self.since).max(0.0);
        *bucket_mut(&mut totals, self.current) += open;
        totals
    }

    fn charge(&mut self, now: f64) {
        let elapsed = (now - self.since).max(0.0);
        *bucket_mut(&mut self.totals, self.current) += elapsed;
        self.since = self.since.max(now);
    }
}

fn bucket_mut(t: &mut StateTotals, b: TimeBucket) -> &mut f64 {
    match b {
        TimeBucket::Idle => &mut t.idle,
        TimeBucket::Busy => &mut t.busy,
        TimeBucket::Waiting => &mut t.waiting,
        TimeBucket::Blocked => &mut t.blocked,
    }
}

/// Push onto a history, dropping the oldest entry beyond [`HISTORY_LEN`].
pub fn push_bounded(history: &mut VecDeque<f64>, value: f64) {
    if history.len() == HISTORY_LEN {
        history.pop_front();
    }
    history.push_back(value);
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut n = 0usize;
    let mut sum = 0.0;
    for v in values {
        n += 1;
        sum += v;
    }
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Equipment class, used to pick recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    Production,
    Crane,
    LadleCar,
}

/// Point-in-time metrics for one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSample {
    pub name: String,
    pub category: UnitCategory,
    /// "EAF", "crane", "tapping", ...
    pub kind: String,
    pub bay: String,
    pub totals: StateTotals,
    pub queue_length: usize,
    /// Mean queue wait over the recent history, minutes.
    pub wait_time: f64,
    /// Mean process cycle over the recent history, minutes.
    pub cycle_time: f64,
    /// Nominal minutes per heat, when the equipment has one.
    pub process_time: Option<f64>,
    pub heats_processed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_charges_each_bucket() {
        let mut c = StateClock::new(0.0);
        c.transition(TimeBucket::Busy, 10.0);
        c.transition(TimeBucket::Waiting, 40.0);
        c.transition(TimeBucket::Idle, 50.0);
        let t = c.totals_at(60.0);
        assert_eq!(t.idle, 20.0);
        assert_eq!(t.busy, 30.0);
        assert_eq!(t.waiting, 10.0);
        assert_eq!(t.total(), 60.0);
        assert!((t.utilization() - 40.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn totals_include_open_interval_without_mutating() {
        let mut c = StateClock::new(0.0);
        c.transition(TimeBucket::Busy, 0.0);
        assert_eq!(c.totals_at(25.0).busy, 25.0);
        assert_eq!(c.totals_at(30.0).busy, 30.0);
        assert_eq!(c.current(), TimeBucket::Busy);
    }

    #[test]
    fn availability_counts_waiting_as_working_and_ignores_blocked() {
        let t = StateTotals {
            idle: 25.0,
            busy: 50.0,
            waiting: 25.0,
            blocked: 10.0,
        };
        assert_eq!(t.availability_pct(), 75.0);
        assert_eq!(t.utilization(), 75.0 / 110.0);
        let no_backlog = StateTotals {
            busy: 75.0,
            waiting: 0.0,
            ..t
        };
        assert_eq!(no_backlog.availability_pct(), 75.0);
        assert_eq!(StateTotals::default().availability_pct(), 0.0);
        assert_eq!(StateTotals::default().utilization(), 0.0);
    }

    #[test]
    fn bounded_history_drops_oldest() {
        let mut h = VecDeque::new();
        for i in 0..(HISTORY_LEN + 5) {
            push_bounded(&mut h, i as f64);
        }
        assert_eq!(h.len(), HISTORY_LEN);
        assert_eq!(h.front(), Some(&5.0));
        assert_eq!(mean([1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean(std::iter::empty()), 0.0);
    }
}
