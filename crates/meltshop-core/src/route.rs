//! Per-heat routes through the plant.
//!
//! A route is the grade's unit-type sequence with a concrete unit picked for
//! every step when the route is first requested. Units are picked by
//! shortest queue, preferring the heat's own bay; ties keep registration
//! order. Finished routes are dropped, so the table only holds heats still
//! moving through the plant: a route is complete once [`RouteManager::advance_heat`]
//! returns `None` for it and [`RouteManager::route`] no longer finds it.

use crate::capability::Schedulable;
use crate::config::PlantConfig;
use crate::heat::Heat;
use crate::id::{HeatId, UnitId};
use crate::unit::UnitType;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub bay: String,
    pub unit_type: UnitType,
    pub unit: UnitId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    steps: Vec<RouteStep>,
    cursor: usize,
}

impl Route {
    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current(&self) -> Option<&RouteStep> {
        self.steps.get(self.cursor)
    }
}

#[derive(Debug, Clone)]
pub struct RouteManager {
    config: Arc<PlantConfig>,
    /// Units per type in registration order.
    registry: BTreeMap<UnitType, Vec<UnitId>>,
    routes: BTreeMap<HeatId, Route>,
    completed: u64,
}

impl RouteManager {
    pub fn new(config: Arc<PlantConfig>) -> Self {
        tracing::info!(
            component = "routes",
            grade_routes = config.grade_routes.len(),
            "route manager created"
        );
        Self {
            config,
            registry: BTreeMap::new(),
            routes: BTreeMap::new(),
            completed: 0,
        }
    }

    /// Swap in a new configuration. Routes already planned are kept.
    pub fn set_config(&mut self, config: Arc<PlantConfig>) {
        self.config = config;
    }

    pub fn register_unit(&mut self, unit_type: UnitType, id: UnitId) {
        self.registry.entry(unit_type).or_default().push(id);
    }

    pub fn units_of(&self, unit_type: UnitType) -> &[UnitId] {
        self.registry.get(&unit_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn route(&self, heat: HeatId) -> Option<&Route> {
        self.routes.get(&heat)
    }

    /// Heats with a route still in progress.
    pub fn active_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn completed_routes(&self) -> u64 {
        self.completed
    }

    /// Route for `heat`, planning it on first use. `None` when some step of
    /// the grade's sequence has no unit to run on.
    pub fn get_route_for_heat<U: Schedulable>(
        &mut self,
        heat: &Heat,
        units: &SlotMap<UnitId, U>,
    ) -> Option<&Route> {
        if !self.routes.contains_key(&heat.id) {
            let route = self.plan(heat, units)?;
            self.routes.insert(heat.id, route);
        }
        self.routes.get(&heat.id)
    }

    fn plan<U: Schedulable>(&self, heat: &Heat, units: &SlotMap<UnitId, U>) -> Option<Route> {
        if !self.config.grade_routes.contains_key(&heat.grade) {
            tracing::warn!(
                component = "routes",
                grade = %heat.grade,
                "no route for grade, using fallback"
            );
        }
        let mut steps = Vec::new();
        for &unit_type in self.config.route_for(heat.grade) {
            let Some(unit) = self.select_unit(unit_type, &heat.bay, units) else {
                tracing::error!(
                    component = "routes",
                    heat = %heat.id,
                    %unit_type,
                    "no unit for route step"
                );
                return None;
            };
            let bay = units.get(unit).map(|u| u.bay().to_string()).unwrap_or_default();
            steps.push(RouteStep {
                bay,
                unit_type,
                unit,
            });
        }
        tracing::info!(
            component = "routes",
            heat = %heat.id,
            grade = %heat.grade,
            steps = steps.len(),
            "route planned"
        );
        Some(Route { steps, cursor: 0 })
    }

    /// Shortest-queue unit of `unit_type`, in `bay` if possible.
    pub fn select_unit<U: Schedulable>(
        &self,
        unit_type: UnitType,
        bay: &str,
        units: &SlotMap<UnitId, U>,
    ) -> Option<UnitId> {
        self.units_of(unit_type)
            .iter()
            .filter_map(|&id| units.get(id).map(|u| (id, u)))
            .min_by_key(|(_, u)| (u.bay() != bay, u.queue_len()))
            .map(|(id, _)| id)
    }

    /// Step the heat should be at now.
    pub fn get_next_step<U: Schedulable>(
        &mut self,
        heat: &Heat,
        units: &SlotMap<UnitId, U>,
    ) -> Option<RouteStep> {
        self.get_route_for_heat(heat, units)?.current().cloned()
    }

    /// Move the cursor past the current step. Returns the new current step,
    /// or `None` once the route is complete (the route is dropped then) or if
    /// the heat has no route.
    pub fn advance_heat(&mut self, heat: HeatId) -> Option<RouteStep> {
        let route = self.routes.get_mut(&heat)?;
        route.cursor += 1;
        if let Some(step) = route.current() {
            tracing::debug!(
                component = "routes",
                %heat,
                unit_type = %step.unit_type,
                "heat advanced"
            );
            return Some(step.clone());
        }
        self.routes.remove(&heat);
        self.completed += 1;
        tracing::info!(component = "routes", %heat, "route complete");
        None
    }

    /// Every non-caster step of the grade's route has had at least its
    /// configured minimum process time.
    pub fn is_ready_for_caster(&self, heat: &Heat) -> bool {
        for &unit_type in self.config.route_for(heat.grade) {
            if unit_type == UnitType::Caster {
                continue;
            }
            let min = self
                .config
                .min_process_times
                .get(&unit_type)
                .copied()
                .unwrap_or(0.0);
            let spent = heat.total_time_at(unit_type);
            if spent < min {
                tracing::warn!(
                    component = "routes",
                    heat = %heat.id,
                    %unit_type,
                    spent,
                    min,
                    "not ready for caster"
                );
                return false;
            }
        }
        true
    }

    /// Forget the planned route; the next request plans afresh.
    pub fn reset_heat(&mut self, heat: HeatId) {
        if self.routes.remove(&heat).is_some() {
            tracing::info!(component = "routes", %heat, "route reset");
        }
    }
}
