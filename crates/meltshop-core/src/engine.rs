//! The production orchestrator: owns every piece of plant equipment and
//! drives it through the scheduler.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The frozen [`PlantConfig`] snapshot, swapped whole by [`Engine::reconfigure`]
//! - Equipment in slotmaps keyed by [`UnitId`], [`CraneId`] and [`CarId`]
//! - Heats keyed by [`HeatId`], the [`LadleManager`] and the [`SpatialPlanner`]
//! - The [`TransportCoordinator`] and [`RouteManager`]
//! - A [`Scheduler`] with one task per piece of equipment plus three plant
//!   tasks (heat generation, route dispatch, ladle maintenance)
//! - An [`EventBus`] for typed plant events
//!
//! # Advance pipeline
//!
//! Each `advance()` runs:
//! 1. **Resume** -- pop every task due before the horizon in `(time, seq)`
//!    order and run one step of it
//! 2. **React** -- route finished heats, forward transport requests, wake
//!    cars that became idle (inside the step that caused it)
//! 3. **Deliver** -- hand buffered events to listeners
//! 4. **Publish** -- compute the state hash and store a fresh
//!    [`PlantSnapshot`] for readers on other threads

use crate::capability::{MetricSource, Transportable};
use crate::config::{ConfigError, PlantConfig};
use crate::crane::{Crane, CraneEvent, CraneStepCtx};
use crate::event::{Event, EventBus};
use crate::fixed::{SimTime, after, minutes, to_minutes};
use crate::grade::SteelGrade;
use crate::heat::{DEFAULT_SLAB_WIDTH, Heat, HeatStage};
use crate::id::{CarId, CraneId, HeatId, UnitId};
use crate::ladle::{LadleLocation, LadleManager, MAINTENANCE_INTERVAL};
use crate::ladle_car::{CarEvent, CarStepCtx, LadleCar, POLL_INTERVAL, Stop};
use crate::metrics::UnitSample;
use crate::query::{CarView, CraneView, PlantSnapshot, SnapshotReader, UnitView};
use crate::rng::SimRng;
use crate::route::{RouteManager, RouteStep};
use crate::scheduler::{Scheduler, TaskId, Wake};
use crate::sim::{AdvanceResult, StateHash};
use crate::transport::{TransportCoordinator, TransportStatus, TransportSummary};
use crate::unit::{ProductionUnit, UnitStepCtx, UnitType};
use arc_swap::ArcSwap;
use meltshop_spatial::{CarType, Point, SpatialError, SpatialPlanner};
use slotmap::SlotMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Priority of transport requests raised when a unit finishes a heat.
pub const TRANSPORT_PRIORITY: i32 = 1;

/// Minutes before heat generation retries after a ladle shortage.
pub const LADLE_RETRY_INTERVAL: f64 = 1.0;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    config: ArcSwap<PlantConfig>,
    scheduler: Scheduler,
    rng: SimRng,
    paused: bool,

    // -- Plant --
    planner: SpatialPlanner,
    units: SlotMap<UnitId, ProductionUnit>,
    cranes: SlotMap<CraneId, Crane>,
    cars: SlotMap<CarId, LadleCar>,
    heats: BTreeMap<HeatId, Heat>,
    ladles: LadleManager,
    transport: TransportCoordinator,
    routes: RouteManager,

    // -- Heat bookkeeping --
    /// Created heats not yet placed at their first unit.
    arrivals: VecDeque<HeatId>,
    next_heat: u32,
    heats_created: u64,
    heats_completed: u64,
    completion_order: Vec<HeatId>,

    /// Typed event bus for plant events.
    pub event_bus: EventBus,

    snapshot: Arc<ArcSwap<PlantSnapshot>>,
    last_state_hash: u64,
}

impl Engine {
    /// Validate `config` and build the plant it describes.
    pub fn new(config: PlantConfig) -> Result<Self, ConfigError> {
        Self::from_validated(config.validate()?)
    }

    /// Build the plant from an already validated configuration.
    ///
    /// Units are laid out evenly along the middle of each bay, cranes park at
    /// the start of the bay's runways and cars start at the center of their
    /// home bay, homed round-robin over the bays in order.
    pub fn from_validated(config: Arc<PlantConfig>) -> Result<Self, ConfigError> {
        let mut planner = SpatialPlanner::new(config.build_bays()?, config.ladle_car_speed)?;
        let mut routes = RouteManager::new(config.clone());

        let mut units = SlotMap::with_key();
        for bay_cfg in &config.bays {
            let bay = planner
                .bay(&bay_cfg.name)
                .ok_or_else(|| SpatialError::UnknownBay(bay_cfg.name.clone()))?;
            let (origin, width, height) = (bay.origin(), bay.width(), bay.height());
            let total: u32 = bay_cfg.units.values().sum();
            let mut slot: u32 = 0;
            for unit_type in UnitType::ALL {
                let count = bay_cfg.units.get(&unit_type).copied().unwrap_or(0);
                for n in 1..=count {
                    slot += 1;
                    let name = format!("{}_{}_{}", bay_cfg.name, unit_type.as_str(), n);
                    let position = Point::new(
                        origin.x + width * f64::from(slot) / f64::from(total + 1),
                        origin.y + height / 2.0,
                    );
                    planner.place_equipment(&bay_cfg.name, &name, unit_type.as_str(), position)?;
                    let id = units.insert(ProductionUnit::new(
                        name,
                        &bay_cfg.name,
                        unit_type,
                        position,
                        config.params_for(unit_type),
                        config.caster_critical_temp,
                    ));
                    routes.register_unit(unit_type, id);
                }
            }
        }

        let mut cranes = SlotMap::with_key();
        for bay_cfg in &config.bays {
            let bay = planner
                .bay(&bay_cfg.name)
                .ok_or_else(|| SpatialError::UnknownBay(bay_cfg.name.clone()))?;
            for i in 0..bay_cfg.cranes as usize {
                let home = match bay.crane_paths() {
                    [] => bay.crane_home(),
                    paths => paths[i % paths.len()].start(),
                };
                let mut crane = Crane::new(format!("{}_crane_{}", bay_cfg.name, i + 1), bay, home);
                crane.set_kinematics(config.crane_speed, config.crane_accel, config.crane_hoist_speed);
                cranes.insert(crane);
            }
        }

        let mut cars = SlotMap::with_key();
        for (i, car_type) in config.ladle_cars.iter().enumerate() {
            let home = &config.bays[i % config.bays.len()].name;
            let position = planner
                .bay_center(home)
                .ok_or_else(|| SpatialError::UnknownBay(home.clone()))?;
            let mut car = LadleCar::new(
                format!("{}_car_{}", car_type.as_str(), i + 1),
                *car_type,
                home,
                position,
            );
            car.set_speed(config.ladle_car_speed);
            cars.insert(car);
        }

        let ladles = LadleManager::new(
            config.n_ladles,
            &config.bay_names(),
            config.ladle_warming_time,
            config.ladle_max_heats,
        );

        let mut scheduler = Scheduler::new();
        scheduler.schedule(TaskId::HeatGenerator, SimTime::ZERO);
        scheduler.schedule(TaskId::LadleFleet, minutes(MAINTENANCE_INTERVAL));

        tracing::info!(
            component = "engine",
            bays = config.bays.len(),
            units = units.len(),
            cranes = cranes.len(),
            cars = cars.len(),
            ladles = ladles.len(),
            seed = config.seed,
            "plant built"
        );

        let mut engine = Self {
            rng: SimRng::new(config.seed),
            config: ArcSwap::new(config),
            scheduler,
            paused: false,
            planner,
            units,
            cranes,
            cars,
            heats: BTreeMap::new(),
            ladles,
            transport: TransportCoordinator::default(),
            routes,
            arrivals: VecDeque::new(),
            next_heat: 1,
            heats_created: 0,
            heats_completed: 0,
            completion_order: Vec::new(),
            event_bus: EventBus::default(),
            snapshot: Arc::new(ArcSwap::from_pointee(PlantSnapshot::default())),
            last_state_hash: 0,
        };
        engine.publish();
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// The configuration snapshot in force.
    pub fn config(&self) -> Arc<PlantConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration.
    ///
    /// Timing, speeds, routes and thresholds may change; the bay layout and
    /// fleet sizes built at startup may not. On error nothing changes.
    pub fn reconfigure(&mut self, config: PlantConfig) -> Result<(), ConfigError> {
        let current = self.config();
        if config.bays != current.bays {
            return Err(ConfigError::LayoutChanged("bay layout"));
        }
        if config.ladle_cars != current.ladle_cars {
            return Err(ConfigError::LayoutChanged("ladle car fleet"));
        }
        if config.n_ladles != current.n_ladles {
            return Err(ConfigError::LayoutChanged("ladle fleet"));
        }
        let config = config.validate()?;
        self.planner.set_car_speed(config.ladle_car_speed)?;

        self.transport.clear_cache();
        for crane in self.cranes.values_mut() {
            crane.set_kinematics(config.crane_speed, config.crane_accel, config.crane_hoist_speed);
        }
        for car in self.cars.values_mut() {
            car.set_speed(config.ladle_car_speed);
        }
        for unit in self.units.values_mut() {
            unit.set_params(config.params_for(unit.unit_type), config.caster_critical_temp);
        }
        self.ladles
            .set_timing(config.ladle_warming_time, config.ladle_max_heats);
        self.routes.set_config(config.clone());
        self.config.store(config);
        tracing::info!(component = "engine", now = self.now(), "configuration swapped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Run every task due within the next `duration` minutes, then move the
    /// clock to the end of the window. Does nothing while paused.
    pub fn advance(&mut self, duration: f64) -> AdvanceResult {
        let until = after(self.scheduler.now(), minutes(duration));
        self.run_until(until)
    }

    /// Run every task due at the next resumption time.
    pub fn step(&mut self) -> AdvanceResult {
        match self.scheduler.next_time() {
            Some(at) => self.run_until(at),
            None => AdvanceResult {
                steps_run: 0,
                now: self.scheduler.now(),
            },
        }
    }

    fn run_until(&mut self, until: SimTime) -> AdvanceResult {
        if self.paused {
            return AdvanceResult {
                steps_run: 0,
                now: self.scheduler.now(),
            };
        }
        let mut steps_run = 0;
        while let Some(task) = self.scheduler.pop_due(until) {
            self.run_task(task);
            steps_run += 1;
        }
        self.scheduler.advance_clock(until);
        self.event_bus.deliver();
        self.publish();
        AdvanceResult {
            steps_run,
            now: self.scheduler.now(),
        }
    }

    fn run_task(&mut self, task: TaskId) {
        let now = self.scheduler.now();
        let wake = match task {
            TaskId::HeatGenerator => self.generate_heat(now),
            TaskId::RouteProcessor => self.dispatch_arrivals(now),
            TaskId::LadleFleet => {
                self.ladles.run_maintenance(to_minutes(now));
                Wake::after(MAINTENANCE_INTERVAL)
            }
            TaskId::Unit(id) => self.run_unit(id, now),
            TaskId::Crane(id) => self.run_crane(id, now),
            TaskId::Car(id) => self.run_car(id, now),
        };
        self.scheduler.apply(task, wake);
    }

    // -----------------------------------------------------------------------
    // Heat generation and dispatch
    // -----------------------------------------------------------------------

    fn generate_heat(&mut self, now: SimTime) -> Wake {
        let config = self.config();
        if self.heats_created >= u64::from(config.max_heats) {
            tracing::info!(
                component = "engine",
                heats = self.heats_created,
                "heat limit reached, generation stopped"
            );
            return Wake::Passivate;
        }
        let grades: Vec<(SteelGrade, f64)> =
            config.grade_distribution.iter().map(|(g, w)| (*g, *w)).collect();
        let weights: Vec<f64> = grades.iter().map(|(_, w)| *w).collect();
        let Some(pick) = self.rng.weighted_index(&weights) else {
            return Wake::Passivate;
        };
        let grade = grades[pick].0;
        let bay = config.bays[self.rng.index(config.bays.len())].name.clone();
        let (lo, hi) = grade.width_range();
        let width = self.rng.range_f64(lo, hi);

        match self.spawn_heat(grade, &bay, width, now) {
            Some(_) => Wake::after(config.heat_interval),
            None => Wake::after(LADLE_RETRY_INTERVAL),
        }
    }

    /// Create a heat in `bay` right now, outside the generator's cadence.
    /// Fails when the bay is unknown or no ladle is free.
    pub fn create_heat(&mut self, grade: SteelGrade, bay: &str) -> Option<HeatId> {
        if self.planner.bay(bay).is_none() {
            tracing::warn!(component = "engine", bay, "heat rejected: unknown bay");
            return None;
        }
        let now = self.scheduler.now();
        self.spawn_heat(grade, bay, DEFAULT_SLAB_WIDTH, now)
    }

    fn spawn_heat(&mut self, grade: SteelGrade, bay: &str, width: f64, now: SimTime) -> Option<HeatId> {
        let now_f = to_minutes(now);
        let Some(ladle) = self.ladles.get_available_ladle(grade, Some(bay), now_f) else {
            self.event_bus.emit(Event::LadleShortage { at: now });
            return None;
        };
        let id = HeatId(self.next_heat);
        if !self.ladles.assign(ladle, id, now_f) {
            tracing::error!(component = "engine", heat = %id, "ladle refused heat");
            return None;
        }
        self.next_heat += 1;

        let mut heat = Heat::new(id, grade, bay, now_f).with_width(width);
        heat.ladle = Some(ladle);
        self.heats.insert(id, heat);
        self.heats_created += 1;
        self.arrivals.push_back(id);
        self.scheduler.wake(TaskId::RouteProcessor);

        tracing::info!(
            component = "engine",
            heat = %id,
            %grade,
            bay,
            width,
            "heat created"
        );
        self.event_bus.emit(Event::HeatCreated {
            heat: id,
            grade,
            bay: bay.to_string(),
            at: now,
        });
        Some(id)
    }

    /// Place new heats at the first unit of their route.
    fn dispatch_arrivals(&mut self, now: SimTime) -> Wake {
        let now_f = to_minutes(now);
        let mut waiting = VecDeque::new();
        while let Some(id) = self.arrivals.pop_front() {
            let Some(heat) = self.heats.get(&id) else {
                continue;
            };
            let Some(step) = self.routes.get_next_step(heat, &self.units) else {
                tracing::error!(component = "engine", heat = %id, "heat has no route, dropped");
                continue;
            };
            let Some(unit) = self.units.get_mut(step.unit) else {
                continue;
            };
            if !unit.add_heat(id, now_f) {
                tracing::debug!(
                    component = "engine",
                    heat = %id,
                    unit = %unit.name,
                    "first unit full, retrying"
                );
                waiting.push_back(id);
                continue;
            }
            if let Some(heat) = self.heats.get_mut(&id) {
                heat.stage = HeatStage::Queued;
                heat.current_unit = Some(step.unit);
                if let Some(ladle) = heat.ladle {
                    self.ladles.move_to(ladle, LadleLocation::Unit(step.unit));
                }
            }
            self.scheduler.wake(TaskId::Unit(step.unit));
            self.event_bus.emit(Event::HeatQueued {
                heat: id,
                unit: step.unit,
                at: now,
            });
        }
        if waiting.is_empty() {
            Wake::Passivate
        } else {
            self.arrivals = waiting;
            Wake::after(POLL_INTERVAL)
        }
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    fn run_unit(&mut self, id: UnitId, now: SimTime) -> Wake {
        let Some(unit) = self.units.get(id) else {
            return Wake::Passivate;
        };
        let held: Vec<HeatId> = unit
            .active()
            .iter()
            .map(|s| s.heat)
            .chain(unit.warming().map(|w| w.heat))
            .collect();
        let bay = unit.bay.clone();
        let downstream_ready: BTreeMap<HeatId, bool> = held
            .into_iter()
            .map(|heat| (heat, self.downstream_ready(heat)))
            .collect();
        let lmf_congested = self
            .units
            .values()
            .any(|u| u.unit_type == UnitType::Lmf && u.bay == bay && u.queue_len() > 1);

        let Some(unit) = self.units.get_mut(id) else {
            return Wake::Passivate;
        };
        let mut ctx = UnitStepCtx {
            heats: &mut self.heats,
            downstream_ready: &downstream_ready,
            lmf_congested,
        };
        let out = unit.step(now, &mut ctx);

        if let Some((from, to)) = out.state_change {
            self.event_bus.emit(Event::UnitStateChanged {
                unit: id,
                from,
                to,
                at: now,
            });
        }
        for heat in out.started {
            self.event_bus.emit(Event::ProcessStarted { heat, unit: id, at: now });
        }
        for heat in out.finished {
            self.event_bus.emit(Event::ProcessFinished { heat, unit: id, at: now });
            self.route_onward(heat, id, now);
        }
        out.wake.unwrap_or(Wake::Passivate)
    }

    /// Whether the unit after the heat's current route step can take it now.
    fn downstream_ready(&self, heat: HeatId) -> bool {
        let Some(route) = self.routes.route(heat) else {
            return true;
        };
        route
            .steps()
            .get(route.cursor() + 1)
            .and_then(|next| self.units.get(next.unit))
            .is_none_or(ProductionUnit::is_available)
    }

    /// A heat left `from`: request transport to the next step or finish it.
    fn route_onward(&mut self, heat: HeatId, from: UnitId, now: SimTime) {
        if self.routes.route(heat).is_none() {
            tracing::error!(component = "engine", %heat, "finished heat has no route");
            return;
        }
        match self.routes.advance_heat(heat) {
            Some(step) => {
                if step.unit_type == UnitType::Caster
                    && let Some(h) = self.heats.get(&heat)
                    && !self.routes.is_ready_for_caster(h)
                {
                    tracing::debug!(component = "engine", %heat, "sent to caster short of treatment");
                }
                self.request_transport(heat, from, step, now);
            }
            None => self.complete_heat(heat, from, now),
        }
    }

    fn complete_heat(&mut self, heat: HeatId, at_unit: UnitId, now: SimTime) {
        let now_f = to_minutes(now);
        let bay = self
            .units
            .get(at_unit)
            .map(|u| u.bay.clone())
            .unwrap_or_default();
        let Some(h) = self.heats.get_mut(&heat) else {
            return;
        };
        h.update_temperature(now_f);
        if !h.mark_complete(now_f) {
            return;
        }
        if let Some(ladle) = h.ladle.take() {
            self.ladles.release(ladle, &bay, now_f);
        }
        self.heats_completed += 1;
        self.completion_order.push(heat);
        tracing::info!(
            component = "engine",
            %heat,
            cycle_time = h.cycle_time(),
            below_critical = h.cast_below_critical,
            "heat complete"
        );
        self.event_bus.emit(Event::HeatCompleted { heat, at: now });
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn request_transport(&mut self, heat: HeatId, from: UnitId, to: RouteStep, now: SimTime) {
        let Some(from_bay) = self.units.get(from).map(|u| u.bay.clone()) else {
            return;
        };
        let car_type = self.transport.request_transport(
            heat,
            Stop {
                bay: from_bay,
                unit: from,
            },
            Stop {
                bay: to.bay,
                unit: to.unit,
            },
            to.unit_type,
            TRANSPORT_PRIORITY,
            to_minutes(now),
        );
        self.event_bus.emit(Event::TransportRequested {
            heat,
            car_type,
            at: now,
        });
        self.dispatch_transport(now);
    }

    /// Hand pending requests to idle cars and wake the cars that got one.
    fn dispatch_transport(&mut self, now: SimTime) {
        if self.transport.pending_len() == 0 {
            return;
        }
        let assigned = self
            .transport
            .process_pending(&mut self.cars, &mut self.planner, to_minutes(now));
        for (heat, car) in assigned {
            self.scheduler.wake(TaskId::Car(car));
            self.event_bus.emit(Event::TransportAssigned { heat, car, at: now });
        }
    }

    /// Transport state of one heat.
    pub fn check_transport_status(&self, heat: HeatId) -> TransportStatus {
        self.transport
            .check_transport_status(heat, &self.cars, self.now())
    }

    /// Fleet-wide transport counters.
    pub fn transport_status(&self) -> TransportSummary {
        self.transport.get_status(&self.cars)
    }

    // -----------------------------------------------------------------------
    // Cars and cranes
    // -----------------------------------------------------------------------

    fn run_car(&mut self, id: CarId, now: SimTime) -> Wake {
        let Some(car) = self.cars.get_mut(id) else {
            return Wake::Passivate;
        };
        let mut ctx = CarStepCtx {
            id,
            cranes: &mut self.cranes,
            units: &mut self.units,
            heats: &mut self.heats,
            ladles: &mut self.ladles,
            planner: &mut self.planner,
            scheduler: &mut self.scheduler,
        };
        let out = car.step(now, &mut ctx);
        let name = car.name.clone();

        if let Some((from, to)) = out.state_change {
            self.event_bus.emit(Event::CarStatusChanged {
                car: id,
                from,
                to,
                at: now,
            });
        }
        for event in out.events {
            match event {
                CarEvent::Loaded { heat } => {
                    tracing::debug!(component = "engine", %heat, car = %name, "heat on car");
                }
                CarEvent::Delivered { heat, unit } => {
                    self.transport.finish(heat, true);
                    self.event_bus.emit(Event::HeatDelivered {
                        heat,
                        car: id,
                        unit,
                        at: now,
                    });
                    self.event_bus.emit(Event::HeatQueued { heat, unit, at: now });
                }
                CarEvent::BecameIdle => {}
                CarEvent::Dropped { heat, from, to } => {
                    self.transport.finish(heat, false);
                    let next = self.units.get(to).map(|u| RouteStep {
                        bay: u.bay.clone(),
                        unit_type: u.unit_type,
                        unit: to,
                    });
                    if let Some(step) = next {
                        tracing::info!(component = "engine", %heat, car = %name, "transport dropped, requesting again");
                        self.request_transport(heat, from, step, now);
                    }
                }
                CarEvent::Fault { fault, .. } => {
                    self.event_bus.emit(Event::Fault {
                        equipment: name.clone(),
                        fault,
                        at: now,
                    });
                }
            }
        }
        if self.cars.get(id).is_some_and(LadleCar::is_available) {
            self.dispatch_transport(now);
        }
        out.wake
    }

    fn run_crane(&mut self, id: CraneId, now: SimTime) -> Wake {
        let Some(crane) = self.cranes.get_mut(id) else {
            return Wake::Passivate;
        };
        let mut ctx = CraneStepCtx {
            id,
            ladles: &mut self.ladles,
        };
        let out = crane.step(now, &mut ctx);
        let name = crane.name.clone();

        if let Some((from, to)) = out.state_change {
            self.event_bus.emit(Event::CraneStateChanged {
                crane: id,
                from,
                to,
                at: now,
            });
        }
        for event in out.events {
            match event {
                CraneEvent::Fault { fault, .. } => self.event_bus.emit(Event::Fault {
                    equipment: name.clone(),
                    fault,
                    at: now,
                }),
                CraneEvent::NothingToLift { heat } => {
                    tracing::debug!(component = "engine", crane = %name, ?heat, "crane found nothing to lift");
                }
                CraneEvent::Lifted { .. } | CraneEvent::Delivered { .. } => {}
            }
        }
        out.wake
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Clock value in minutes.
    pub fn now(&self) -> f64 {
        to_minutes(self.scheduler.now())
    }

    pub fn clock(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn units(&self) -> &SlotMap<UnitId, ProductionUnit> {
        &self.units
    }

    pub fn unit_by_name(&self, name: &str) -> Option<(UnitId, &ProductionUnit)> {
        self.units.iter().find(|(_, u)| u.name == name)
    }

    pub fn cranes(&self) -> &SlotMap<CraneId, Crane> {
        &self.cranes
    }

    pub fn cars(&self) -> &SlotMap<CarId, LadleCar> {
        &self.cars
    }

    pub fn cars_of(&self, car_type: CarType) -> impl Iterator<Item = (CarId, &LadleCar)> {
        self.cars.iter().filter(move |(_, c)| c.car_type() == car_type)
    }

    pub fn heat(&self, id: HeatId) -> Option<&Heat> {
        self.heats.get(&id)
    }

    /// Every heat created so far, in id order.
    pub fn heats(&self) -> impl Iterator<Item = &Heat> {
        self.heats.values()
    }

    pub fn ladles(&self) -> &LadleManager {
        &self.ladles
    }

    pub fn routes(&self) -> &RouteManager {
        &self.routes
    }

    pub fn planner(&self) -> &SpatialPlanner {
        &self.planner
    }

    pub fn heats_created(&self) -> u64 {
        self.heats_created
    }

    pub fn heats_completed(&self) -> u64 {
        self.heats_completed
    }

    /// Heats in the order they completed.
    pub fn completion_order(&self) -> &[HeatId] {
        &self.completion_order
    }

    /// Heats cast below the critical casting temperature.
    pub fn heats_below_critical(&self) -> u64 {
        self.units.values().map(ProductionUnit::below_critical).sum()
    }

    /// Distance driven by every ladle car.
    pub fn total_distance(&self) -> f64 {
        self.cars.values().map(LadleCar::distance_traveled).sum()
    }

    /// Current metrics of every unit, crane and car, in that order.
    pub fn samples(&self) -> Vec<UnitSample> {
        let now = self.now();
        self.units
            .values()
            .map(|u| u.sample(now))
            .chain(self.cranes.values().map(|c| c.sample(now)))
            .chain(self.cars.values().map(|c| c.sample(now)))
            .collect()
    }

    /// Handle for polling published snapshots, possibly from another thread.
    pub fn snapshot_reader(&self) -> SnapshotReader {
        SnapshotReader::new(self.snapshot.clone())
    }

    /// Hash of observable plant state as of the last advance.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    fn publish(&mut self) {
        self.last_state_hash = self.compute_state_hash();
        let now = self.now();
        let snapshot = PlantSnapshot {
            now,
            heats_created: self.heats_created,
            heats_completed: self.heats_completed,
            heats_in_process: self.heats.values().filter(|h| !h.is_complete()).count(),
            pending_transports: self.transport.pending_len(),
            units: self
                .units
                .values()
                .map(|u| UnitView {
                    name: u.name.clone(),
                    bay: u.bay.clone(),
                    unit_type: u.unit_type,
                    state: u.state(),
                    queue_length: u.queue_len(),
                    processing: u.active().iter().map(|s| s.heat).collect(),
                    warming: u.warming().map(|w| w.heat).collect(),
                    heats_processed: u.heats_processed(),
                    totals: u.totals_at(now),
                })
                .collect(),
            cranes: self
                .cranes
                .values()
                .map(|c| CraneView {
                    name: c.name.clone(),
                    bay: c.bay.clone(),
                    state: c.state(),
                    position: c.position(),
                    heat: c.current_heat(),
                    holding_ladle: c.current_ladle().is_some(),
                    queue_length: c.queue_len(),
                    tasks: c.task_count(),
                })
                .collect(),
            cars: self
                .cars
                .values()
                .map(|c| CarView {
                    name: c.name.clone(),
                    car_type: c.car_type(),
                    status: c.status(),
                    current_bay: c.current_bay().to_string(),
                    destination_bay: c.destination().map(|d| d.bay.clone()),
                    heat: c.heat(),
                    position: c.position(),
                    progress: c.progress(),
                    distance_traveled: c.distance_traveled(),
                })
                .collect(),
            ladles: self.ladles.stats(now),
        };
        self.snapshot.store(Arc::new(snapshot));
    }

    fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_time(self.scheduler.now());
        h.write_u64(self.rng.state());
        h.write_u64(self.heats_created);
        h.write_u64(self.heats_completed);
        for id in &self.completion_order {
            h.write_u32(id.0);
        }
        for heat in self.heats.values() {
            h.write_u32(heat.id.0);
            h.write_u32(heat.stage as u32);
            h.write_f64(heat.temperature());
        }
        for unit in self.units.values() {
            h.write_str(&unit.name);
            h.write_u32(unit.state() as u32);
            h.write_u64(unit.queue_len() as u64);
            h.write_u64(unit.heats_processed());
        }
        for crane in self.cranes.values() {
            h.write_u32(crane.state() as u32);
            h.write_f64(crane.position().x);
            h.write_f64(crane.position().y);
            h.write_u64(crane.task_count());
        }
        for car in self.cars.values() {
            h.write_u32(car.status() as u32);
            h.write_f64(car.position().x);
            h.write_f64(car.position().y);
            h.write_f64(car.distance_traveled());
        }
        h.finish()
    }
}
