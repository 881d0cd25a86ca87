//! Ladle cars.
//!
//! A car takes one heat per trip: drive empty to the pickup bay, have a
//! crane lift the ladle from the unit onto the car, drive loaded to the
//! destination bay, have a crane set the ladle down at the destination unit.
//! The car walks its path one segment per step.
//!
//! Crane work is requested through the crane pool of the bay the car is
//! standing in. When no crane is free the car polls again after
//! [`POLL_INTERVAL`]; that is waiting, not an error.

use crate::capability::{MetricSource, Transportable};
use crate::crane::{Crane, Site};
use crate::error::EquipmentFault;
use crate::fixed::{SimTime, minutes, to_minutes};
use crate::heat::{Heat, HeatStage};
use crate::id::{CarId, CraneId, HeatId, UnitId};
use crate::ladle::{LadleLocation, LadleManager};
use crate::metrics::{StateClock, TimeBucket, UnitCategory, UnitSample, mean, push_bounded};
use crate::scheduler::{Scheduler, TaskId, Wake};
use crate::transport::request_crane;
use crate::unit::ProductionUnit;
use meltshop_spatial::{CarType, DEFAULT_LADLE_CAR_SPEED, PathSegment, Point, SpatialPlanner};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, VecDeque};

/// Retry interval while waiting for a crane or a free destination, minutes.
pub const POLL_INTERVAL: f64 = 1.0;
/// Minutes in one non-idle status before a potential deadlock is reported.
pub const CAR_DEADLOCK_TIMEOUT: f64 = 15.0;
/// Priority of crane tasks raised by cars.
pub const CRANE_TASK_PRIORITY: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarStatus {
    Idle,
    Loading,
    Moving,
    Unloading,
    Error,
}

impl CarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarStatus::Idle => "idle",
            CarStatus::Loading => "loading",
            CarStatus::Moving => "moving",
            CarStatus::Unloading => "unloading",
            CarStatus::Error => "error",
        }
    }
}

/// One end of a trip: a unit and the bay it stands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub bay: String,
    pub unit: UnitId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CarEvent {
    Loaded { heat: HeatId },
    Delivered { heat: HeatId, unit: UnitId },
    /// The car is free for new work.
    BecameIdle,
    /// A fault interrupted a trip; the heat was left at `from` and still has
    /// to reach `to`.
    Dropped { heat: HeatId, from: UnitId, to: UnitId },
    Fault { fault: EquipmentFault, prior: CarStatus },
}

/// Plant state a car touches during one step.
pub struct CarStepCtx<'a> {
    pub id: CarId,
    pub cranes: &'a mut SlotMap<CraneId, Crane>,
    pub units: &'a mut SlotMap<UnitId, ProductionUnit>,
    pub heats: &'a mut BTreeMap<HeatId, Heat>,
    pub ladles: &'a mut LadleManager,
    pub planner: &'a mut SpatialPlanner,
    pub scheduler: &'a mut Scheduler,
}

#[derive(Debug)]
pub struct CarStep {
    pub wake: Wake,
    pub events: Vec<CarEvent>,
    pub state_change: Option<(CarStatus, CarStatus)>,
}

/// Progress along the current trip, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathProgress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct LadleCar {
    pub name: String,
    car_type: CarType,
    home_bay: String,
    current_bay: String,
    position: Point,
    speed: f64,
    status: CarStatus,
    heat: Option<HeatId>,
    pickup: Option<Stop>,
    destination: Option<Stop>,
    /// Empty run to the pickup bay.
    deadhead: VecDeque<PathSegment>,
    /// Remaining legs of the current run.
    path: VecDeque<PathSegment>,
    /// Bay the current run ends in.
    leg_bay: String,
    progress: PathProgress,
    in_transit: Option<PathSegment>,
    busy_until: Option<SimTime>,
    cooldown_until: Option<SimTime>,
    crane: Option<CraneId>,
    distance_traveled: f64,
    status_since: f64,
    deadlock_warned: bool,
    trip_started: f64,
    clock: StateClock,
    trips: u64,
    delivered: u64,
    error_count: u64,
    wait_history: VecDeque<f64>,
    cycle_history: VecDeque<f64>,
}

impl LadleCar {
    pub fn new(name: impl Into<String>, car_type: CarType, home_bay: &str, position: Point) -> Self {
        Self {
            name: name.into(),
            car_type,
            home_bay: home_bay.to_string(),
            current_bay: home_bay.to_string(),
            position,
            speed: DEFAULT_LADLE_CAR_SPEED,
            status: CarStatus::Idle,
            heat: None,
            pickup: None,
            destination: None,
            deadhead: VecDeque::new(),
            path: VecDeque::new(),
            leg_bay: home_bay.to_string(),
            progress: PathProgress { done: 0, total: 0 },
            in_transit: None,
            busy_until: None,
            cooldown_until: None,
            crane: None,
            distance_traveled: 0.0,
            status_since: 0.0,
            deadlock_warned: false,
            trip_started: 0.0,
            clock: StateClock::new(0.0),
            trips: 0,
            delivered: 0,
            error_count: 0,
            wait_history: VecDeque::new(),
            cycle_history: VecDeque::new(),
        }
    }

    /// Speed is informational; travel times come from the planner.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn status(&self) -> CarStatus {
        self.status
    }

    pub fn heat(&self) -> Option<HeatId> {
        self.heat
    }

    pub fn pickup(&self) -> Option<&Stop> {
        self.pickup.as_ref()
    }

    pub fn destination(&self) -> Option<&Stop> {
        self.destination.as_ref()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn distance_traveled(&self) -> f64 {
        self.distance_traveled
    }

    pub fn progress(&self) -> PathProgress {
        self.progress
    }

    pub fn trips(&self) -> u64 {
        self.trips
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Idle with no heat, no destination and no cooldown pending.
    pub fn is_available(&self) -> bool {
        self.status == CarStatus::Idle
            && self.heat.is_none()
            && self.destination.is_none()
            && self.cooldown_until.is_none()
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Take a heat from `pickup` to `destination`.
    ///
    /// Fails without changing anything if the car is busy or either path
    /// cannot be planned.
    pub fn assign_heat(
        &mut self,
        heat: HeatId,
        pickup: Stop,
        destination: Stop,
        planner: &mut SpatialPlanner,
        now: f64,
    ) -> bool {
        if !self.is_available() {
            return false;
        }
        let deadhead = planner.get_path_between_bays(&self.current_bay, &pickup.bay, Some(self.car_type));
        let loaded = planner.get_path_between_bays(&pickup.bay, &destination.bay, Some(self.car_type));
        let (deadhead, loaded) = match (deadhead, loaded) {
            (Ok(d), Ok(l)) => (d, l),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(
                    component = "ladle_car",
                    car = %self.name,
                    %heat,
                    error = %e,
                    "cannot plan trip"
                );
                return false;
            }
        };

        tracing::info!(
            component = "ladle_car",
            car = %self.name,
            %heat,
            from = %pickup.bay,
            to = %destination.bay,
            segments = loaded.len(),
            "heat assigned"
        );
        self.heat = Some(heat);
        // Only the empty run is skipped when the car already stands there.
        self.deadhead = if self.current_bay == pickup.bay {
            VecDeque::new()
        } else {
            deadhead.into()
        };
        self.progress = PathProgress {
            done: 0,
            total: self.deadhead.len() + loaded.len(),
        };
        self.path = loaded.into();
        self.leg_bay = pickup.bay.clone();
        self.pickup = Some(pickup);
        self.destination = Some(destination);
        self.trip_started = now;
        self.trips += 1;
        self.set_status(CarStatus::Loading, now);
        true
    }

    fn set_status(&mut self, next: CarStatus, now: f64) {
        if next == self.status {
            return;
        }
        let bucket = match next {
            CarStatus::Idle => TimeBucket::Idle,
            CarStatus::Error => TimeBucket::Blocked,
            _ => TimeBucket::Busy,
        };
        self.clock.transition(bucket, now);
        tracing::debug!(
            component = "ladle_car",
            car = %self.name,
            from = self.status.as_str(),
            to = next.as_str(),
            "status change"
        );
        self.status = next;
        self.status_since = now;
        self.deadlock_warned = false;
    }

    fn clear_trip(&mut self) {
        self.heat = None;
        self.pickup = None;
        self.destination = None;
        self.deadhead.clear();
        self.path.clear();
        self.in_transit = None;
        self.crane = None;
        self.progress = PathProgress { done: 0, total: 0 };
    }

    /// Abort the current trip. A ladle already on the car is set back down at
    /// the pickup unit so the heat can be collected again.
    pub fn fail(&mut self, fault: EquipmentFault, now: SimTime, ctx: &mut CarStepCtx<'_>) -> Vec<CarEvent> {
        let prior = self.status;
        let now_f = to_minutes(now);
        self.error_count += 1;
        if fault.is_critical() {
            tracing::error!(
                component = "ladle_car",
                car = %self.name,
                bay = %self.current_bay,
                prior = prior.as_str(),
                heat = ?self.heat,
                error = %fault,
                "critical car fault"
            );
        } else {
            tracing::warn!(
                component = "ladle_car",
                car = %self.name,
                bay = %self.current_bay,
                prior = prior.as_str(),
                heat = ?self.heat,
                error = %fault,
                "car fault"
            );
        }

        let mut events = Vec::new();
        if let (Some(heat), Some(pickup), Some(dest)) = (self.heat, &self.pickup, &self.destination) {
            if let Some(ladle) = ctx.ladles.find_at(&LadleLocation::Car(ctx.id), Some(heat)) {
                ctx.ladles.move_to(ladle, LadleLocation::Unit(pickup.unit));
            }
            if let Some(h) = ctx.heats.get_mut(&heat) {
                h.stage = HeatStage::AwaitingTransport;
                h.current_unit = Some(pickup.unit);
            }
            events.push(CarEvent::Dropped {
                heat,
                from: pickup.unit,
                to: dest.unit,
            });
        }
        self.clear_trip();
        self.leg_bay = self.current_bay.clone();

        let until = now.saturating_add(minutes(fault.cooldown()));
        self.busy_until = None;
        if fault.is_critical() {
            self.set_status(CarStatus::Idle, now_f);
            self.cooldown_until = Some(until);
        } else {
            self.set_status(CarStatus::Error, now_f);
            self.busy_until = Some(until);
        }
        events.push(CarEvent::Fault { fault, prior });
        events
    }

    /// Run one resumption at `now`.
    pub fn step(&mut self, now: SimTime, ctx: &mut CarStepCtx<'_>) -> CarStep {
        let now_f = to_minutes(now);
        let before = self.status;
        let mut events = Vec::new();
        self.check_deadlock(now_f);

        let wake = loop {
            if let Some(end) = self.busy_until {
                if now < end {
                    break Wake::Hold(end.saturating_sub(now));
                }
                self.busy_until = None;
                if let Err(fault) = self.finish_wait(now_f, ctx) {
                    events.extend(self.fail(fault, now, ctx));
                }
                continue;
            }
            if let Some(until) = self.cooldown_until {
                if now < until {
                    break Wake::Hold(until.saturating_sub(now));
                }
                self.cooldown_until = None;
                events.push(CarEvent::BecameIdle);
            }
            match self.act(now, ctx, &mut events) {
                Ok(Some(wake)) => break wake,
                Ok(None) => continue,
                Err(fault) => events.extend(self.fail(fault, now, ctx)),
            }
        };

        let state_change = (before != self.status).then_some((before, self.status));
        CarStep {
            wake,
            events,
            state_change,
        }
    }

    fn drive(&mut self, seg: PathSegment, now: SimTime) -> Wake {
        // Zero-length legs still take one poll interval.
        let t = if seg.travel_time > 0.0 {
            seg.travel_time
        } else {
            POLL_INTERVAL
        };
        self.in_transit = Some(seg);
        let d = minutes(t);
        self.busy_until = Some(now.saturating_add(d));
        Wake::Hold(d)
    }

    /// A timed wait ran out: a segment was completed or a cooldown expired.
    fn finish_wait(&mut self, now: f64, ctx: &mut CarStepCtx<'_>) -> Result<(), EquipmentFault> {
        if self.status == CarStatus::Error {
            tracing::info!(component = "ladle_car", car = %self.name, "recovered from fault");
            if self.current_bay == self.home_bay {
                self.set_status(CarStatus::Idle, now);
                return Ok(());
            }
            let home = ctx
                .planner
                .get_path_between_bays(&self.current_bay, &self.home_bay, Some(self.car_type))
                .map_err(|e| EquipmentFault::NoPath {
                    detail: e.to_string(),
                })?;
            self.progress = PathProgress {
                done: 0,
                total: home.len(),
            };
            self.path = home.into();
            self.leg_bay = self.home_bay.clone();
            self.set_status(CarStatus::Moving, now);
            return Ok(());
        }

        let Some(seg) = self.in_transit.take() else {
            return Ok(());
        };
        self.distance_traveled += seg.distance;
        self.position = seg.to;
        self.progress.done += 1;
        if let Some(heat) = self.heat.and_then(|h| ctx.heats.get_mut(&h)) {
            heat.update_temperature(now);
        }
        Ok(())
    }

    /// Advance the status machine. `Ok(None)` means re-evaluate immediately.
    fn act(
        &mut self,
        now: SimTime,
        ctx: &mut CarStepCtx<'_>,
        events: &mut Vec<CarEvent>,
    ) -> Result<Option<Wake>, EquipmentFault> {
        let now_f = to_minutes(now);
        match self.status {
            CarStatus::Idle => Ok(Some(Wake::Passivate)),
            CarStatus::Error => {
                // Cooldown was cut short; resume as idle.
                self.set_status(CarStatus::Idle, now_f);
                events.push(CarEvent::BecameIdle);
                Ok(None)
            }
            CarStatus::Loading => {
                if let Some(seg) = self.deadhead.pop_front() {
                    return Ok(Some(self.drive(seg, now)));
                }
                let heat = self.heat.ok_or(EquipmentFault::NoActiveTask { state: "loading" })?;
                let pickup = self
                    .pickup
                    .clone()
                    .ok_or(EquipmentFault::NoActiveTask { state: "loading" })?;
                self.current_bay = pickup.bay.clone();

                if ctx.ladles.find_at(&LadleLocation::Car(ctx.id), Some(heat)).is_some() {
                    push_bounded(&mut self.wait_history, now_f - self.trip_started);
                    self.crane = None;
                    if let Some(dest) = &self.destination {
                        self.leg_bay = dest.bay.clone();
                    }
                    if let Some(h) = ctx.heats.get_mut(&heat) {
                        h.stage = HeatStage::InTransit;
                        h.current_unit = None;
                    }
                    tracing::info!(component = "ladle_car", car = %self.name, %heat, "loaded");
                    events.push(CarEvent::Loaded { heat });
                    self.set_status(CarStatus::Moving, now_f);
                    return Ok(None);
                }
                if self.crane_busy_for(heat, ctx) {
                    return Ok(Some(Wake::after(POLL_INTERVAL)));
                }
                let from = self.unit_site(pickup.unit, ctx)?;
                let to = self.car_site(ctx.id);
                self.call_crane(&pickup.bay, heat, from, to, now_f, ctx)
            }
            CarStatus::Moving => {
                if let Some(seg) = self.path.pop_front() {
                    return Ok(Some(self.drive(seg, now)));
                }
                self.current_bay = self.leg_bay.clone();
                if self.heat.is_some() {
                    self.set_status(CarStatus::Unloading, now_f);
                    return Ok(None);
                }
                tracing::info!(component = "ladle_car", car = %self.name, bay = %self.current_bay, "arrived empty");
                self.clear_trip();
                self.set_status(CarStatus::Idle, now_f);
                events.push(CarEvent::BecameIdle);
                Ok(Some(Wake::Passivate))
            }
            CarStatus::Unloading => {
                let heat = self.heat.ok_or(EquipmentFault::NoActiveTask { state: "unloading" })?;
                let dest = self
                    .destination
                    .clone()
                    .ok_or(EquipmentFault::NoActiveTask { state: "unloading" })?;

                if ctx
                    .ladles
                    .find_at(&LadleLocation::Unit(dest.unit), Some(heat))
                    .is_some()
                {
                    let unit = ctx.units.get_mut(dest.unit).ok_or_else(|| EquipmentFault::UnknownSite {
                        site: format!("{:?}", dest.unit),
                    })?;
                    if !unit.add_heat(heat, now_f) {
                        tracing::debug!(
                            component = "ladle_car",
                            car = %self.name,
                            %heat,
                            unit = %unit.name,
                            "destination full, retrying"
                        );
                        return Ok(Some(Wake::after(POLL_INTERVAL)));
                    }
                    ctx.scheduler.wake(TaskId::Unit(dest.unit));
                    if let Some(h) = ctx.heats.get_mut(&heat) {
                        h.stage = HeatStage::Queued;
                        h.current_unit = Some(dest.unit);
                        h.update_temperature(now_f);
                    }
                    push_bounded(&mut self.cycle_history, now_f - self.trip_started);
                    self.delivered += 1;
                    tracing::info!(component = "ladle_car", car = %self.name, %heat, "delivered");
                    self.clear_trip();
                    self.set_status(CarStatus::Idle, now_f);
                    events.push(CarEvent::Delivered {
                        heat,
                        unit: dest.unit,
                    });
                    events.push(CarEvent::BecameIdle);
                    return Ok(Some(Wake::Passivate));
                }
                if self.crane_busy_for(heat, ctx) {
                    return Ok(Some(Wake::after(POLL_INTERVAL)));
                }
                let accepting = ctx.units.get(dest.unit).is_some_and(|u| u.can_accept());
                if !accepting {
                    return Ok(Some(Wake::after(POLL_INTERVAL)));
                }
                let from = self.car_site(ctx.id);
                let to = self.unit_site(dest.unit, ctx)?;
                self.call_crane(&dest.bay, heat, from, to, now_f, ctx)
            }
        }
    }

    fn crane_busy_for(&self, heat: HeatId, ctx: &CarStepCtx<'_>) -> bool {
        self.crane
            .and_then(|c| ctx.cranes.get(c))
            .is_some_and(|c| c.is_serving(heat))
    }

    fn unit_site(&self, unit: UnitId, ctx: &CarStepCtx<'_>) -> Result<Site, EquipmentFault> {
        let point = ctx
            .units
            .get(unit)
            .map(|u| u.position)
            .ok_or_else(|| EquipmentFault::UnknownSite {
                site: format!("{unit:?}"),
            })?;
        Ok(Site {
            point,
            at: LadleLocation::Unit(unit),
        })
    }

    fn car_site(&self, id: CarId) -> Site {
        Site {
            point: self.position,
            at: LadleLocation::Car(id),
        }
    }

    fn call_crane(
        &mut self,
        bay: &str,
        heat: HeatId,
        from: Site,
        to: Site,
        now: f64,
        ctx: &mut CarStepCtx<'_>,
    ) -> Result<Option<Wake>, EquipmentFault> {
        let Some(id) = request_crane(ctx.cranes, bay) else {
            tracing::debug!(component = "ladle_car", car = %self.name, bay, "no crane free, waiting");
            return Ok(Some(Wake::after(POLL_INTERVAL)));
        };
        let Some(crane) = ctx.cranes.get_mut(id) else {
            return Ok(Some(Wake::after(POLL_INTERVAL)));
        };
        let estimate = crane.assign_task(Some(from), Some(to), CRANE_TASK_PRIORITY, Some(heat), now);
        if crane.current_heat() != Some(heat) {
            return Err(EquipmentFault::UnknownSite {
                site: format!("crane {} rejected task", crane.name),
            });
        }
        self.crane = Some(id);
        ctx.scheduler.wake(TaskId::Crane(id));
        Ok(Some(Wake::after(estimate.max(POLL_INTERVAL))))
    }

    fn check_deadlock(&mut self, now: f64) {
        if self.status == CarStatus::Idle || self.deadlock_warned {
            return;
        }
        let stuck = now - self.status_since;
        if stuck > CAR_DEADLOCK_TIMEOUT {
            self.deadlock_warned = true;
            tracing::warn!(
                component = "ladle_car",
                car = %self.name,
                bay = %self.current_bay,
                status = self.status.as_str(),
                heat = ?self.heat,
                duration = stuck,
                "potential deadlock"
            );
        }
    }
}

impl Transportable for LadleCar {
    fn name(&self) -> &str {
        &self.name
    }

    fn car_type(&self) -> CarType {
        self.car_type
    }

    fn current_bay(&self) -> &str {
        &self.current_bay
    }

    fn home_bay(&self) -> &str {
        &self.home_bay
    }

    fn is_available(&self) -> bool {
        LadleCar::is_available(self)
    }
}

impl MetricSource for LadleCar {
    fn sample(&self, now: f64) -> UnitSample {
        UnitSample {
            name: self.name.clone(),
            category: UnitCategory::LadleCar,
            kind: self.car_type.as_str().to_string(),
            bay: self.current_bay.clone(),
            totals: self.clock.totals_at(now),
            queue_length: 0,
            wait_time: mean(self.wait_history.iter().copied()),
            cycle_time: mean(self.cycle_history.iter().copied()),
            process_time: None,
            heats_processed: self.delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitParams;
    use crate::crane::CraneStepCtx;
    use crate::grade::SteelGrade;
    use crate::unit::UnitType;
    use meltshop_spatial::Bay;

    struct Rig {
        cars: SlotMap<CarId, LadleCar>,
        car: CarId,
        cranes: SlotMap<CraneId, Crane>,
        units: SlotMap<UnitId, ProductionUnit>,
        eaf: UnitId,
        lmf: UnitId,
        heats: BTreeMap<HeatId, Heat>,
        ladles: LadleManager,
        planner: SpatialPlanner,
        scheduler: Scheduler,
    }

    fn params() -> UnitParams {
        UnitParams {
            process_time: 30.0,
            min_process_time: 30.0,
            capacity: 1,
        }
    }

    fn rig() -> Rig {
        let bay1 = Bay::new("bay1", 0.0, 0.0, 200.0, 200.0).unwrap();
        let bay2 = Bay::new("bay2", 200.0, 0.0, 200.0, 200.0).unwrap();
        let mut cranes = SlotMap::with_key();
        cranes.insert(Crane::new("bay1_crane_1", &bay1, Point::new(10.0, 10.0)));
        cranes.insert(Crane::new("bay2_crane_1", &bay2, Point::new(210.0, 10.0)));
        let mut units = SlotMap::with_key();
        let eaf = units.insert(ProductionUnit::new(
            "bay1_eaf_1",
            "bay1",
            UnitType::Eaf,
            Point::new(50.0, 100.0),
            params(),
            1400.0,
        ));
        let lmf = units.insert(ProductionUnit::new(
            "bay2_lmf_1",
            "bay2",
            UnitType::Lmf,
            Point::new(300.0, 50.0),
            params(),
            1400.0,
        ));
        let mut cars = SlotMap::with_key();
        let car = cars.insert(LadleCar::new(
            "tapping_car_1",
            CarType::Tapping,
            "bay1",
            Point::new(100.0, 100.0),
        ));
        let mut heats = BTreeMap::new();
        heats.insert(HeatId(1), Heat::new(HeatId(1), SteelGrade::Standard, "bay1", 0.0));
        let mut ladles = LadleManager::new(2, &["bay1".to_string()], 15.0, 5);
        let ladle = ladles
            .get_available_ladle(SteelGrade::Standard, Some("bay1"), 0.0)
            .unwrap();
        ladles.assign(ladle, HeatId(1), 0.0);
        ladles.move_to(ladle, LadleLocation::Unit(eaf));
        Rig {
            cars,
            car,
            cranes,
            units,
            eaf,
            lmf,
            heats,
            ladles,
            planner: SpatialPlanner::new(vec![bay1, bay2], 150.0).unwrap(),
            scheduler: Scheduler::new(),
        }
    }

    fn stops(r: &Rig) -> (Stop, Stop) {
        (
            Stop {
                bay: "bay1".into(),
                unit: r.eaf,
            },
            Stop {
                bay: "bay2".into(),
                unit: r.lmf,
            },
        )
    }

    /// Drive cars and cranes through the scheduler until nothing is pending.
    fn run(r: &mut Rig) -> Vec<CarEvent> {
        let mut events = Vec::new();
        let mut steps = 0;
        while let Some(task) = r.scheduler.pop_due(SimTime::MAX) {
            steps += 1;
            assert!(steps < 1_000, "simulation did not settle");
            let now = r.scheduler.now();
            let wake = match task {
                TaskId::Car(id) => {
                    let Some(car) = r.cars.get_mut(id) else { continue };
                    let mut ctx = CarStepCtx {
                        id,
                        cranes: &mut r.cranes,
                        units: &mut r.units,
                        heats: &mut r.heats,
                        ladles: &mut r.ladles,
                        planner: &mut r.planner,
                        scheduler: &mut r.scheduler,
                    };
                    let step = car.step(now, &mut ctx);
                    events.extend(step.events);
                    step.wake
                }
                TaskId::Crane(id) => {
                    let Some(crane) = r.cranes.get_mut(id) else { continue };
                    let mut ctx = CraneStepCtx {
                        id,
                        ladles: &mut r.ladles,
                    };
                    crane.step(now, &mut ctx).wake
                }
                _ => Wake::Passivate,
            };
            r.scheduler.apply(task, wake);
        }
        events
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    #[test]
    fn assignment_flips_availability_immediately() {
        let mut r = rig();
        let (pickup, dest) = stops(&r);
        let car = &mut r.cars[r.car];
        assert!(car.is_available());
        assert!(car.assign_heat(HeatId(1), pickup.clone(), dest.clone(), &mut r.planner, 0.0));
        assert!(!car.is_available());
        assert_eq!(car.status(), CarStatus::Loading);
        assert!(!car.assign_heat(HeatId(2), pickup, dest, &mut r.planner, 0.0));
        assert_eq!(car.heat(), Some(HeatId(1)));
    }

    #[test]
    fn unknown_bay_is_rejected_without_state_change() {
        let mut r = rig();
        let (pickup, _) = stops(&r);
        let bogus = Stop {
            bay: "bay9".into(),
            unit: r.lmf,
        };
        let car = &mut r.cars[r.car];
        assert!(!car.assign_heat(HeatId(1), pickup, bogus, &mut r.planner, 0.0));
        assert!(car.is_available());
        assert_eq!(car.destination(), None);
    }

    // -----------------------------------------------------------------------
    // Trips
    // -----------------------------------------------------------------------

    #[test]
    fn full_trip_delivers_heat_to_destination_queue() {
        let mut r = rig();
        let (pickup, dest) = stops(&r);
        let id = r.car;
        assert!(r.cars[id].assign_heat(HeatId(1), pickup, dest, &mut r.planner, 0.0));
        r.scheduler.wake(TaskId::Car(id));

        let events = run(&mut r);
        assert!(events.contains(&CarEvent::Loaded { heat: HeatId(1) }));
        assert!(events.contains(&CarEvent::Delivered {
            heat: HeatId(1),
            unit: r.lmf,
        }));
        assert_eq!(events.last(), Some(&CarEvent::BecameIdle));

        let car = &r.cars[id];
        assert!(car.is_available());
        assert_eq!(car.delivered(), 1);
        assert_eq!(Transportable::current_bay(car), "bay2");
        // Inter-bay L route: 200 across, no vertical leg between centers.
        assert!((car.distance_traveled() - 200.0).abs() < 1e-9);

        let lmf = &r.units[r.lmf];
        assert_eq!(lmf.queued_heats().collect::<Vec<_>>(), vec![HeatId(1)]);
        assert_eq!(r.heats[&HeatId(1)].stage, HeatStage::Queued);
        let ladle = r.ladles.ladle_of(HeatId(1)).unwrap();
        assert_eq!(r.ladles.get(ladle).unwrap().location, LadleLocation::Unit(r.lmf));
    }

    #[test]
    fn waits_without_error_when_no_crane_is_free() {
        let mut r = rig();
        let (pickup, dest) = stops(&r);
        // Occupy the only bay1 crane with an unrelated task.
        let crane = r.cranes.keys().next().unwrap();
        r.cranes[crane].assign_task(
            Some(Site {
                point: Point::new(20.0, 20.0),
                at: LadleLocation::Unit(r.eaf),
            }),
            Some(Site {
                point: Point::new(30.0, 30.0),
                at: LadleLocation::Unit(r.eaf),
            }),
            0,
            Some(HeatId(99)),
            0.0,
        );
        let id = r.car;
        r.cars[id].assign_heat(HeatId(1), pickup, dest, &mut r.planner, 0.0);
        let mut ctx = CarStepCtx {
            id,
            cranes: &mut r.cranes,
            units: &mut r.units,
            heats: &mut r.heats,
            ladles: &mut r.ladles,
            planner: &mut r.planner,
            scheduler: &mut r.scheduler,
        };
        let step = r.cars[id].step(SimTime::ZERO, &mut ctx);
        assert_eq!(step.wake, Wake::after(POLL_INTERVAL));
        assert!(step.events.is_empty());
        assert_eq!(r.cars[id].status(), CarStatus::Loading);
    }

    #[test]
    fn fault_returns_heat_to_pickup_and_heads_home() {
        let mut r = rig();
        let (pickup, dest) = stops(&r);
        let id = r.car;
        r.cars[id].assign_heat(HeatId(1), pickup, dest, &mut r.planner, 0.0);
        let mut ctx = CarStepCtx {
            id,
            cranes: &mut r.cranes,
            units: &mut r.units,
            heats: &mut r.heats,
            ladles: &mut r.ladles,
            planner: &mut r.planner,
            scheduler: &mut r.scheduler,
        };
        let events = r.cars[id].fail(
            EquipmentFault::NoPath {
                detail: "test".into(),
            },
            SimTime::ZERO,
            &mut ctx,
        );
        assert_eq!(
            events[0],
            CarEvent::Dropped {
                heat: HeatId(1),
                from: r.eaf,
                to: r.lmf,
            }
        );
        let car = &r.cars[id];
        assert_eq!(car.status(), CarStatus::Error);
        assert_eq!(car.heat(), None);
        assert!(!car.is_available());
        assert_eq!(r.heats[&HeatId(1)].stage, HeatStage::AwaitingTransport);

        // Cooldown, then already home: straight back to idle.
        r.scheduler.schedule(TaskId::Car(id), SimTime::ZERO);
        run(&mut r);
        assert!(r.cars[id].is_available());
        assert_eq!(r.cars[id].error_count(), 1);
    }
}
