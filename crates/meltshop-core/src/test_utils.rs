//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::{PlantConfig, UnitParams};
use crate::engine::Engine;
use crate::fixed::{SimTime, minutes};
use crate::grade::SteelGrade;
use crate::heat::Heat;
use crate::id::HeatId;
use crate::metrics::{StateTotals, UnitCategory, UnitSample};
use crate::unit::{ProductionUnit, UnitType};
use meltshop_spatial::{Bay, Point, SpatialPlanner};

// ===========================================================================
// Time helper
// ===========================================================================

pub fn t(v: f64) -> SimTime {
    minutes(v)
}

// ===========================================================================
// Configurations
// ===========================================================================

/// One bay, one EAF (50/50), one LMF (30/30), one caster (20/20), standard
/// grade only, a single heat.
pub fn scenario_config() -> PlantConfig {
    PlantConfig {
        max_heats: 1,
        ..PlantConfig::single_bay()
    }
}

/// The two-bay default plant with a different seed.
pub fn seeded_config(seed: u64) -> PlantConfig {
    PlantConfig {
        seed,
        ..PlantConfig::default()
    }
}

// ===========================================================================
// Heat and unit constructors
// ===========================================================================

pub fn heat(id: u32, grade: SteelGrade) -> Heat {
    Heat::new(HeatId(id), grade, "bay1", 0.0)
}

pub fn params(process_time: f64, min_process_time: f64, capacity: u32) -> UnitParams {
    UnitParams {
        process_time,
        min_process_time,
        capacity,
    }
}

pub fn make_unit(unit_type: UnitType, p: UnitParams) -> ProductionUnit {
    ProductionUnit::new(
        format!("bay1_{}_1", unit_type.as_str()),
        "bay1",
        unit_type,
        Point::new(100.0, 100.0),
        p,
        1400.0,
    )
}

/// Two adjacent 200x200 bays, centers at (200, 200) and (400, 200).
pub fn two_bay_planner() -> SpatialPlanner {
    SpatialPlanner::new(
        vec![
            Bay::new("bay1", 100.0, 100.0, 200.0, 200.0).unwrap(),
            Bay::new("bay2", 300.0, 100.0, 200.0, 200.0).unwrap(),
        ],
        150.0,
    )
    .unwrap()
}

// ===========================================================================
// Metric samples
// ===========================================================================

/// A sample with the given utilization over 100 minutes.
pub fn sample(name: &str, category: UnitCategory, utilization: f64, queue: usize, wait: f64) -> UnitSample {
    UnitSample {
        name: name.to_string(),
        category,
        kind: match category {
            UnitCategory::Production => "EAF".to_string(),
            UnitCategory::Crane => "crane".to_string(),
            UnitCategory::LadleCar => "tapping".to_string(),
        },
        bay: "bay1".to_string(),
        totals: StateTotals {
            busy: utilization * 100.0,
            idle: (1.0 - utilization) * 100.0,
            waiting: 0.0,
            blocked: 0.0,
        },
        queue_length: queue,
        wait_time: wait,
        cycle_time: 50.0,
        process_time: Some(50.0),
        heats_processed: 0,
    }
}

// ===========================================================================
// Engine helpers
// ===========================================================================

pub fn single_bay_engine(config: PlantConfig) -> Engine {
    Engine::new(config).unwrap()
}

/// Advance in `step`-minute chunks until `done` holds or `limit` minutes
/// have passed. Returns whether `done` was reached.
pub fn run_until(engine: &mut Engine, step: f64, limit: f64, done: impl Fn(&Engine) -> bool) -> bool {
    while engine.now() < limit {
        if done(engine) {
            return true;
        }
        engine.advance(step);
    }
    done(engine)
}
