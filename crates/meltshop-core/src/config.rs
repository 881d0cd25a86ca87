//! Plant configuration.
//!
//! [`PlantConfig`] is plain data with a default for every field. It becomes
//! usable only through [`PlantConfig::validate`], which checks it and freezes
//! it into an `Arc` shared by every component. Runtime changes go through
//! `Engine::reconfigure`, which validates a whole new config and swaps it in.

use crate::grade::SteelGrade;
use crate::unit::UnitType;
use meltshop_spatial::{Bay, CarType, CranePath, SpatialError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Route used for grades without an entry in `grade_routes`.
pub const FALLBACK_ROUTE: [UnitType; 3] = [UnitType::Eaf, UnitType::Lmf, UnitType::Caster];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a configuration is rejected at startup or reconfiguration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No grade routes at all; routing would silently use the fallback.
    #[error("configuration has no grade routes")]
    MissingGradeRoutes,
    #[error("route for grade '{0}' is empty")]
    EmptyRoute(SteelGrade),
    /// A route names a unit type no bay provides.
    #[error("route for grade '{grade}' needs a {unit_type} but no bay has one")]
    RouteUnitMissing { grade: SteelGrade, unit_type: UnitType },
    #[error("{unit_type} capacity must be at least 1")]
    InvalidCapacity { unit_type: UnitType },
    #[error("'{field}' must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("configuration has no bays")]
    NoBays,
    #[error("fleet '{0}' is empty")]
    EmptyFleet(&'static str),
    /// Transport requests of this class could never be served.
    #[error("no {0} ladle car in the fleet")]
    MissingCarType(CarType),
    #[error("grade distribution has no positive weight")]
    InvalidDistribution,
    /// Reconfiguration tried to change what was built at startup.
    #[error("{0} cannot change while the plant is running")]
    LayoutChanged(&'static str),
    #[error("spatial layout rejected: {0}")]
    Spatial(#[from] SpatialError),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Timing and capacity of one unit type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitParams {
    pub process_time: f64,
    pub min_process_time: f64,
    #[serde(default = "one")]
    pub capacity: u32,
}

fn one() -> u32 {
    1
}

/// One bay and the equipment built in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayConfig {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub crane_paths: Vec<CranePath>,
    /// Number of units of each type in this bay.
    #[serde(default)]
    pub units: BTreeMap<UnitType, u32>,
    #[serde(default)]
    pub cranes: u32,
}

impl BayConfig {
    fn standard(name: &str, x: f64, y: f64) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            width: 200.0,
            height: 200.0,
            crane_paths: vec![
                CranePath {
                    start_x: x + 20.0,
                    end_x: x + 180.0,
                    y: y + 50.0,
                },
                CranePath {
                    start_x: x + 20.0,
                    end_x: x + 180.0,
                    y: y + 150.0,
                },
            ],
            units: [
                (UnitType::Eaf, 1),
                (UnitType::Lmf, 2),
                (UnitType::Degasser, 1),
                (UnitType::Caster, 1),
            ]
            .into(),
            cranes: 2,
        }
    }
}

/// Thresholds and cadence for the bottleneck analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minutes between metric samples.
    pub sample_interval: f64,
    /// Samples kept per metric.
    pub window: usize,
    pub high_utilization: f64,
    pub queue_alert: f64,
    pub wait_alert: f64,
    /// Target minutes per heat.
    pub takt_time: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sample_interval: 10.0,
            window: 20,
            high_utilization: 0.85,
            queue_alert: 2.0,
            wait_alert: 20.0,
            takt_time: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PlantConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    /// Default run length for headless mode, minutes.
    pub simulation_time: f64,
    /// Minutes between generated heats.
    pub heat_interval: f64,
    pub max_heats: u32,
    pub seed: u64,
    pub bays: Vec<BayConfig>,
    pub unit_params: BTreeMap<UnitType, UnitParams>,
    pub caster_critical_temp: f64,
    pub n_ladles: usize,
    pub ladle_warming_time: f64,
    pub ladle_max_heats: u32,
    /// Ladle cars, homed round-robin over the bays in order.
    pub ladle_cars: Vec<CarType>,
    pub ladle_car_speed: f64,
    pub crane_speed: f64,
    pub crane_accel: f64,
    pub crane_hoist_speed: f64,
    pub grade_distribution: BTreeMap<SteelGrade, f64>,
    pub grade_routes: BTreeMap<SteelGrade, Vec<UnitType>>,
    /// Least time a heat must have spent at each unit type before casting.
    pub min_process_times: BTreeMap<UnitType, f64>,
    pub analytics: AnalyticsConfig,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            simulation_time: 1440.0,
            heat_interval: 60.0,
            max_heats: 50,
            seed: 42,
            bays: vec![
                BayConfig::standard("bay1", 100.0, 100.0),
                BayConfig::standard("bay2", 300.0, 100.0),
            ],
            unit_params: [
                (UnitType::Eaf, UnitParams { process_time: 50.0, min_process_time: 50.0, capacity: 1 }),
                (UnitType::Lmf, UnitParams { process_time: 30.0, min_process_time: 30.0, capacity: 1 }),
                (UnitType::Degasser, UnitParams { process_time: 40.0, min_process_time: 35.0, capacity: 1 }),
                (UnitType::Caster, UnitParams { process_time: 20.0, min_process_time: 20.0, capacity: 1 }),
            ]
            .into(),
            caster_critical_temp: 1400.0,
            n_ladles: 12,
            ladle_warming_time: 15.0,
            ladle_max_heats: 5,
            ladle_cars: vec![CarType::Tapping, CarType::Treatment, CarType::Rh],
            ladle_car_speed: 150.0,
            crane_speed: 100.0,
            crane_accel: 10.0,
            crane_hoist_speed: 20.0,
            grade_distribution: [
                (SteelGrade::Standard, 0.60),
                (SteelGrade::HighClean, 0.20),
                (SteelGrade::Decarb, 0.15),
                (SteelGrade::TempSensitive, 0.05),
            ]
            .into(),
            grade_routes: [
                (SteelGrade::Standard, FALLBACK_ROUTE.to_vec()),
                (SteelGrade::HighClean, vec![UnitType::Eaf, UnitType::Lmf, UnitType::Degasser, UnitType::Caster]),
                (SteelGrade::Decarb, vec![UnitType::Eaf, UnitType::Lmf, UnitType::Degasser, UnitType::Caster]),
                (SteelGrade::TempSensitive, FALLBACK_ROUTE.to_vec()),
            ]
            .into(),
            min_process_times: [
                (UnitType::Eaf, 50.0),
                (UnitType::Lmf, 30.0),
                (UnitType::Degasser, 35.0),
                (UnitType::Caster, 20.0),
            ]
            .into(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl PlantConfig {
    /// Check the configuration and freeze it.
    pub fn validate(self) -> Result<Arc<PlantConfig>, ConfigError> {
        if self.bays.is_empty() {
            return Err(ConfigError::NoBays);
        }
        // Geometry, duplicate names and speed are checked by the planner.
        meltshop_spatial::SpatialPlanner::new(self.build_bays()?, self.ladle_car_speed)?;

        for (field, value) in [
            ("heat_interval", self.heat_interval),
            ("crane_speed", self.crane_speed),
            ("crane_accel", self.crane_accel),
            ("crane_hoist_speed", self.crane_hoist_speed),
            ("ladle_max_heats", self.ladle_max_heats as f64),
            ("analytics.sample_interval", self.analytics.sample_interval),
            ("analytics.takt_time", self.analytics.takt_time),
            ("analytics.window", self.analytics.window as f64),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        for (unit_type, p) in &self.unit_params {
            if p.capacity == 0 {
                return Err(ConfigError::InvalidCapacity {
                    unit_type: *unit_type,
                });
            }
        }

        if self.grade_routes.is_empty() {
            return Err(ConfigError::MissingGradeRoutes);
        }
        let built: Vec<UnitType> = UnitType::ALL
            .into_iter()
            .filter(|t| self.bays.iter().any(|b| b.units.get(t).copied().unwrap_or(0) > 0))
            .collect();
        let fallback = SteelGrade::ALL
            .into_iter()
            .find(|g| !self.grade_routes.contains_key(g))
            .map(|g| (g, FALLBACK_ROUTE.to_vec()));
        for (grade, route) in self.grade_routes.iter().map(|(g, r)| (*g, r.clone())).chain(fallback) {
            if route.is_empty() {
                return Err(ConfigError::EmptyRoute(grade));
            }
            for unit_type in route {
                if !built.contains(&unit_type) {
                    return Err(ConfigError::RouteUnitMissing { grade, unit_type });
                }
                if !self.unit_params.contains_key(&unit_type) {
                    return Err(ConfigError::InvalidCapacity { unit_type });
                }
            }
        }

        if !self.grade_distribution.values().any(|w| *w > 0.0) {
            return Err(ConfigError::InvalidDistribution);
        }
        if self.n_ladles == 0 {
            return Err(ConfigError::EmptyFleet("ladles"));
        }
        if self.ladle_cars.is_empty() {
            return Err(ConfigError::EmptyFleet("ladle_cars"));
        }
        if self.bays.iter().any(|b| b.cranes == 0) {
            return Err(ConfigError::EmptyFleet("cranes"));
        }
        let mut needed = vec![CarType::Treatment];
        if self.bays.len() > 1 {
            needed.push(CarType::Tapping);
        }
        if let Some(missing) = needed.into_iter().find(|t| !self.ladle_cars.contains(t)) {
            return Err(ConfigError::MissingCarType(missing));
        }
        Ok(Arc::new(self))
    }

    /// Bay geometry, with crane runways attached.
    pub fn build_bays(&self) -> Result<Vec<Bay>, SpatialError> {
        self.bays
            .iter()
            .map(|b| {
                Ok(Bay::new(&b.name, b.x, b.y, b.width, b.height)?
                    .with_crane_paths(b.crane_paths.iter().copied()))
            })
            .collect()
    }

    pub fn bay_names(&self) -> Vec<String> {
        self.bays.iter().map(|b| b.name.clone()).collect()
    }

    /// Route for a grade, or the fallback.
    pub fn route_for(&self, grade: SteelGrade) -> &[UnitType] {
        self.grade_routes
            .get(&grade)
            .map(Vec::as_slice)
            .unwrap_or(&FALLBACK_ROUTE)
    }

    pub fn params_for(&self, unit_type: UnitType) -> UnitParams {
        self.unit_params.get(&unit_type).copied().unwrap_or(UnitParams {
            process_time: 0.0,
            min_process_time: 0.0,
            capacity: 1,
        })
    }

    /// A one-bay plant with a single EAF, LMF and caster.
    pub fn single_bay() -> Self {
        let mut bay = BayConfig::standard("bay1", 0.0, 0.0);
        bay.units = [(UnitType::Eaf, 1), (UnitType::Lmf, 1), (UnitType::Caster, 1)].into();
        bay.cranes = 1;
        Self {
            bays: vec![bay],
            ladle_cars: vec![CarType::Treatment],
            grade_distribution: [(SteelGrade::Standard, 1.0)].into(),
            grade_routes: [(SteelGrade::Standard, FALLBACK_ROUTE.to_vec())].into(),
            n_ladles: 4,
            ..Self::default()
        }
    }
}
