//! Overhead cranes.
//!
//! A crane runs one task at a time: drive to the source, lift the ladle,
//! drive to the destination, lower it. Each phase holds the crane for a
//! computed duration. Tasks arriving while the crane is busy wait in a
//! priority queue (highest priority first, FIFO among equals).
//!
//! # Timing
//!
//! - Travel uses a trapezoidal velocity profile (triangular when the move
//!   is too short to reach full speed), memoized per point pair in both
//!   directions.
//! - Lift and lower take [`HOIST_BASE_TIME`] plus the hoist travel from the
//!   hook height to [`WORKING_HEIGHT`]. A lift ends with the ladle raised to
//!   [`TRAVEL_HEIGHT`]; a lower leaves the hook at the working height.

use crate::capability::MetricSource;
use crate::error::EquipmentFault;
use crate::fixed::{SimTime, minutes, to_minutes};
use crate::id::{CraneId, HeatId, LadleId};
use crate::ladle::{LadleLocation, LadleManager};
use crate::metrics::{StateClock, TimeBucket, UnitCategory, UnitSample, mean, push_bounded};
use crate::scheduler::Wake;
use meltshop_spatial::{Bay, Point};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

pub const DEFAULT_CRANE_SPEED: f64 = 100.0;
pub const DEFAULT_CRANE_ACCEL: f64 = 10.0;
pub const DEFAULT_HOIST_SPEED: f64 = 20.0;

/// Fixed part of a lift or lower, minutes.
pub const HOIST_BASE_TIME: f64 = 3.0;
/// Lift plus lower allowance added to a task estimate, minutes.
pub const TASK_OVERHEAD: f64 = 6.0;
/// Hook height at which ladles are engaged.
pub const WORKING_HEIGHT: f64 = 10.0;
/// Hook height while a ladle is carried, and where a new crane parks it.
pub const TRAVEL_HEIGHT: f64 = 30.0;
/// Minutes in one non-idle state before a potential deadlock is reported.
pub const DEADLOCK_TIMEOUT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CraneState {
    Idle,
    Moving,
    Lifting,
    Lowering,
    Error,
}

impl CraneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CraneState::Idle => "idle",
            CraneState::Moving => "moving",
            CraneState::Lifting => "lifting",
            CraneState::Lowering => "lowering",
            CraneState::Error => "error",
        }
    }
}

/// A pickup or drop-off point and who holds the ladle there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub point: Point,
    pub at: LadleLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraneTask {
    pub source: Site,
    pub destination: Site,
    pub priority: i32,
    pub heat: Option<HeatId>,
}

#[derive(Debug, Clone)]
struct QueuedTask {
    task: CraneTask,
    seq: u64,
    since: f64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // Max-heap: higher priority first, then earlier insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Something a crane step did that the rest of the plant must react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CraneEvent {
    Lifted { ladle: LadleId, heat: Option<HeatId> },
    Delivered { ladle: LadleId, heat: Option<HeatId>, to: LadleLocation },
    /// Lift found nothing at the source; the task was dropped.
    NothingToLift { heat: Option<HeatId> },
    Fault { fault: EquipmentFault, prior: CraneState },
}

/// Plant state a crane touches during one step.
pub struct CraneStepCtx<'a> {
    pub id: CraneId,
    pub ladles: &'a mut LadleManager,
}

#[derive(Debug)]
pub struct CraneStep {
    pub wake: Wake,
    pub events: Vec<CraneEvent>,
    pub state_change: Option<(CraneState, CraneState)>,
}

#[derive(Debug, Clone)]
pub struct Crane {
    pub name: String,
    pub bay: String,
    bounds: Bay,
    speed: f64,
    accel: f64,
    hoist_speed: f64,
    position: Point,
    z: f64,
    state: CraneState,
    task: Option<CraneTask>,
    task_started: f64,
    queue: BinaryHeap<QueuedTask>,
    next_seq: u64,
    current_ladle: Option<LadleId>,
    /// End of the phase in progress.
    busy_until: Option<SimTime>,
    /// Idle but not accepting work until this time after a critical fault.
    cooldown_until: Option<SimTime>,
    state_since: f64,
    deadlock_warned: bool,
    move_cache: HashMap<[u64; 4], f64>,
    clock: StateClock,
    task_count: u64,
    error_count: u64,
    wait_history: VecDeque<f64>,
    cycle_history: VecDeque<f64>,
}

impl Crane {
    pub fn new(name: impl Into<String>, bay: &Bay, home: Point) -> Self {
        Self {
            name: name.into(),
            bay: bay.name().to_string(),
            bounds: bay.clone(),
            speed: DEFAULT_CRANE_SPEED,
            accel: DEFAULT_CRANE_ACCEL,
            hoist_speed: DEFAULT_HOIST_SPEED,
            position: home,
            z: TRAVEL_HEIGHT,
            state: CraneState::Idle,
            task: None,
            task_started: 0.0,
            queue: BinaryHeap::new(),
            next_seq: 0,
            current_ladle: None,
            busy_until: None,
            cooldown_until: None,
            state_since: 0.0,
            deadlock_warned: false,
            move_cache: HashMap::new(),
            clock: StateClock::new(0.0),
            task_count: 0,
            error_count: 0,
            wait_history: VecDeque::new(),
            cycle_history: VecDeque::new(),
        }
    }

    /// Set speed, acceleration and hoist speed. Cached move times are
    /// dropped because they depend on all three.
    pub fn set_kinematics(&mut self, speed: f64, accel: f64, hoist_speed: f64) {
        self.speed = speed;
        self.accel = accel;
        self.hoist_speed = hoist_speed;
        self.move_cache.clear();
    }

    pub fn state(&self) -> CraneState {
        self.state
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Hook height.
    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn current_ladle(&self) -> Option<LadleId> {
        self.current_ladle
    }

    pub fn current_heat(&self) -> Option<HeatId> {
        self.task.as_ref().and_then(|t| t.heat)
    }

    pub fn task(&self) -> Option<&CraneTask> {
        self.task.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn task_count(&self) -> u64 {
        self.task_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Idle, nothing queued and not cooling down.
    pub fn is_available(&self) -> bool {
        self.state == CraneState::Idle && self.queue.is_empty() && self.cooldown_until.is_none()
    }

    /// Whether the crane has work for `heat` in hand or queued.
    pub fn is_serving(&self, heat: HeatId) -> bool {
        self.current_heat() == Some(heat) || self.queue.iter().any(|q| q.task.heat == Some(heat))
    }

    /// Travel time between two points, memoized in both directions.
    pub fn movement_time(&mut self, from: Point, to: Point) -> f64 {
        let key = [from.x.to_bits(), from.y.to_bits(), to.x.to_bits(), to.y.to_bits()];
        if let Some(t) = self.move_cache.get(&key) {
            return *t;
        }
        let t = trapezoid_time(from.distance(&to), self.speed, self.accel);
        self.move_cache.insert(key, t);
        self.move_cache
            .insert([key[2], key[3], key[0], key[1]], t);
        t
    }

    pub fn cached_moves(&self) -> usize {
        self.move_cache.len()
    }

    fn hoist_time(&self) -> f64 {
        (self.z - WORKING_HEIGHT).abs() / self.hoist_speed + HOIST_BASE_TIME
    }

    /// Give the crane a task.
    ///
    /// Returns the estimated minutes until the ladle is picked up when the
    /// task starts now, and `0.0` when the task was queued or rejected.
    /// Missing sites and sites outside the crane's bay are rejected without
    /// changing any state.
    pub fn assign_task(
        &mut self,
        source: Option<Site>,
        destination: Option<Site>,
        priority: i32,
        heat: Option<HeatId>,
        now: f64,
    ) -> f64 {
        let (Some(source), Some(destination)) = (source, destination) else {
            tracing::error!(
                component = "crane",
                crane = %self.name,
                "task rejected: source or destination missing"
            );
            return 0.0;
        };
        if !self.bounds.contains_point(source.point) || !self.bounds.contains_point(destination.point)
        {
            tracing::error!(
                component = "crane",
                crane = %self.name,
                bay = %self.bay,
                "task rejected: site outside bay"
            );
            return 0.0;
        }

        let task = CraneTask {
            source,
            destination,
            priority,
            heat,
        };
        if !self.is_available() {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.queue.push(QueuedTask {
                task,
                seq,
                since: now,
            });
            tracing::info!(
                component = "crane",
                crane = %self.name,
                priority,
                queued = self.queue.len(),
                "task queued"
            );
            return 0.0;
        }

        let estimate = self.movement_time(self.position, task.source.point) + TASK_OVERHEAD;
        self.begin(task, now);
        estimate
    }

    fn begin(&mut self, task: CraneTask, now: f64) {
        tracing::info!(
            component = "crane",
            crane = %self.name,
            heat = ?task.heat,
            task = self.task_count + 1,
            "task assigned"
        );
        self.task = Some(task);
        self.task_started = now;
        self.task_count += 1;
        self.busy_until = None;
        self.set_state(CraneState::Moving, now);
    }

    fn set_state(&mut self, next: CraneState, now: f64) {
        if next == self.state {
            return;
        }
        let bucket = match next {
            CraneState::Idle => TimeBucket::Idle,
            CraneState::Error => TimeBucket::Blocked,
            _ => TimeBucket::Busy,
        };
        self.clock.transition(bucket, now);
        self.state = next;
        self.state_since = now;
        self.deadlock_warned = false;
    }

    /// Put the crane through fault recovery. Whatever it holds is set back
    /// down at the task's source.
    pub fn fail(
        &mut self,
        fault: EquipmentFault,
        now: SimTime,
        ladles: &mut LadleManager,
    ) -> CraneEvent {
        let prior = self.state;
        let now_f = to_minutes(now);
        self.error_count += 1;
        if fault.is_critical() {
            tracing::error!(
                component = "crane",
                crane = %self.name,
                bay = %self.bay,
                prior = prior.as_str(),
                ladle = ?self.current_ladle,
                heat = ?self.current_heat(),
                error = %fault,
                "critical crane fault"
            );
        } else {
            tracing::warn!(
                component = "crane",
                crane = %self.name,
                bay = %self.bay,
                prior = prior.as_str(),
                ladle = ?self.current_ladle,
                heat = ?self.current_heat(),
                error = %fault,
                errors = self.error_count,
                "crane fault"
            );
        }

        if let (Some(ladle), Some(task)) = (self.current_ladle.take(), self.task.as_ref()) {
            ladles.move_to(ladle, task.source.at.clone());
        }
        self.current_ladle = None;
        self.task = None;
        let until = now.saturating_add(minutes(fault.cooldown()));
        if fault.is_critical() {
            self.set_state(CraneState::Idle, now_f);
            self.busy_until = None;
            self.cooldown_until = Some(until);
        } else {
            self.set_state(CraneState::Error, now_f);
            self.busy_until = Some(until);
        }
        CraneEvent::Fault { fault, prior }
    }

    /// Run one resumption at `now`.
    pub fn step(&mut self, now: SimTime, ctx: &mut CraneStepCtx<'_>) -> CraneStep {
        let now_f = to_minutes(now);
        let before = self.state;
        let mut events = Vec::new();
        self.check_deadlock(now_f);

        let wake = loop {
            if let Some(end) = self.busy_until {
                if now < end {
                    break Wake::Hold(end.saturating_sub(now));
                }
                self.busy_until = None;
                match self.finish_phase(now_f, ctx) {
                    Ok(Some(event)) => events.push(event),
                    Ok(None) => {}
                    Err(fault) => events.push(self.fail(fault, now, ctx.ladles)),
                }
                continue;
            }
            if let Some(until) = self.cooldown_until {
                if now < until {
                    break Wake::Hold(until.saturating_sub(now));
                }
                self.cooldown_until = None;
            }
            match self.start_phase(now_f) {
                Ok(Some(duration)) => {
                    self.busy_until = Some(now.saturating_add(minutes(duration)));
                    break Wake::Hold(minutes(duration));
                }
                Ok(None) => break Wake::Passivate,
                Err(fault) => events.push(self.fail(fault, now, ctx.ladles)),
            }
        };

        let state_change = (before != self.state).then_some((before, self.state));
        CraneStep {
            wake,
            events,
            state_change,
        }
    }

    /// Begin the phase for the current state. `None` means nothing to do.
    fn start_phase(&mut self, now: f64) -> Result<Option<f64>, EquipmentFault> {
        match self.state {
            CraneState::Idle => {
                let Some(next) = self.queue.pop() else {
                    return Ok(None);
                };
                push_bounded(&mut self.wait_history, now - next.since);
                self.begin(next.task, now);
                self.start_phase(now)
            }
            CraneState::Moving => {
                let task = self.task.as_ref().ok_or(EquipmentFault::NoActiveTask {
                    state: "moving",
                })?;
                let target = if self.current_ladle.is_some() {
                    task.destination.point
                } else {
                    task.source.point
                };
                let t = self.movement_time(self.position, target);
                tracing::debug!(component = "crane", crane = %self.name, eta = t, "moving");
                Ok(Some(t))
            }
            CraneState::Lifting => {
                if self.current_ladle.is_some() {
                    return Err(EquipmentFault::Invariant {
                        detail: "ladle already held when lift started".into(),
                    });
                }
                Ok(Some(self.hoist_time()))
            }
            CraneState::Lowering => {
                if self.current_ladle.is_none() {
                    return Err(EquipmentFault::MissingLadle { state: "lowering" });
                }
                Ok(Some(self.hoist_time()))
            }
            // The cooldown was set when the fault was raised.
            CraneState::Error => {
                self.set_state(CraneState::Idle, now);
                self.start_phase(now)
            }
        }
    }

    /// Complete the phase whose hold just ended.
    fn finish_phase(
        &mut self,
        now: f64,
        ctx: &mut CraneStepCtx<'_>,
    ) -> Result<Option<CraneEvent>, EquipmentFault> {
        match self.state {
            CraneState::Idle => Ok(None),
            CraneState::Error => {
                tracing::info!(component = "crane", crane = %self.name, "recovered from fault");
                self.set_state(CraneState::Idle, now);
                Ok(None)
            }
            CraneState::Moving => {
                let task = self.task.as_ref().ok_or(EquipmentFault::NoActiveTask {
                    state: "moving",
                })?;
                if self.current_ladle.is_some() {
                    self.position = task.destination.point;
                    self.set_state(CraneState::Lowering, now);
                } else {
                    self.position = task.source.point;
                    self.set_state(CraneState::Lifting, now);
                }
                Ok(None)
            }
            CraneState::Lifting => {
                let task = self.task.as_ref().ok_or(EquipmentFault::NoActiveTask {
                    state: "lifting",
                })?;
                let heat = task.heat;
                match ctx.ladles.find_at(&task.source.at, heat) {
                    Some(ladle) => {
                        ctx.ladles.move_to(ladle, LadleLocation::Crane(ctx.id));
                        self.current_ladle = Some(ladle);
                        self.z = TRAVEL_HEIGHT;
                        self.set_state(CraneState::Moving, now);
                        tracing::info!(
                            component = "crane",
                            crane = %self.name,
                            ?ladle,
                            heat = ?heat,
                            "ladle lifted"
                        );
                        Ok(Some(CraneEvent::Lifted { ladle, heat }))
                    }
                    None => {
                        tracing::warn!(
                            component = "crane",
                            crane = %self.name,
                            heat = ?heat,
                            "no ladle found at source, task dropped"
                        );
                        self.z = WORKING_HEIGHT;
                        self.task = None;
                        self.set_state(CraneState::Idle, now);
                        Ok(Some(CraneEvent::NothingToLift { heat }))
                    }
                }
            }
            CraneState::Lowering => {
                let ladle = self
                    .current_ladle
                    .ok_or(EquipmentFault::MissingLadle { state: "lowering" })?;
                let task = self.task.take().ok_or(EquipmentFault::NoActiveTask {
                    state: "lowering",
                })?;
                ctx.ladles.move_to(ladle, task.destination.at.clone());
                self.current_ladle = None;
                self.z = WORKING_HEIGHT;
                push_bounded(&mut self.cycle_history, now - self.task_started);
                self.set_state(CraneState::Idle, now);
                tracing::info!(
                    component = "crane",
                    crane = %self.name,
                    ?ladle,
                    heat = ?task.heat,
                    "ladle delivered"
                );
                Ok(Some(CraneEvent::Delivered {
                    ladle,
                    heat: task.heat,
                    to: task.destination.at,
                }))
            }
        }
    }

    fn check_deadlock(&mut self, now: f64) {
        if self.state == CraneState::Idle || self.deadlock_warned {
            return;
        }
        let stuck = now - self.state_since;
        if stuck > DEADLOCK_TIMEOUT {
            self.deadlock_warned = true;
            tracing::warn!(
                component = "crane",
                crane = %self.name,
                bay = %self.bay,
                state = self.state.as_str(),
                duration = stuck,
                has_ladle = self.current_ladle.is_some(),
                "potential deadlock"
            );
        }
    }
}

/// Minutes to cover `distance` starting and ending at rest.
pub fn trapezoid_time(distance: f64, speed: f64, accel: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    let t_accel = speed / accel;
    let d_accel = 0.5 * accel * t_accel * t_accel;
    if distance < 2.0 * d_accel {
        // Never reaches full speed.
        2.0 * (distance / accel).sqrt()
    } else {
        2.0 * t_accel + (distance - 2.0 * d_accel) / speed
    }
}

impl MetricSource for Crane {
    fn sample(&self, now: f64) -> UnitSample {
        UnitSample {
            name: self.name.clone(),
            category: UnitCategory::Crane,
            kind: "crane".to_string(),
            bay: self.bay.clone(),
            totals: self.clock.totals_at(now),
            queue_length: self.queue.len(),
            wait_time: mean(self.wait_history.iter().copied()),
            cycle_time: mean(self.cycle_history.iter().copied()),
            process_time: None,
            heats_processed: self.task_count,
        }
    }
}
