//! The flat summary printed after a headless run.

use meltshop_core::engine::Engine;
use meltshop_stats::BottleneckAnalyzer;
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: f64 = 1440.0;

/// Key/value summary of a headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Clock at the end of the run, minutes.
    pub simulation_time: f64,
    pub heats_processed: u64,
    pub heats_completed: u64,
    /// Names of the flagged units, worst first.
    pub bottlenecks: Vec<String>,
    /// Completed heats per day at the observed rate.
    pub throughput: f64,
    /// Share of completed heats cast at or above the critical temperature, %.
    #[serde(rename = "yield")]
    pub yield_pct: f64,
    /// Mean working share of working plus idle time over production units, %.
    pub availability: f64,
}

impl RunSummary {
    pub fn collect(engine: &Engine, analyzer: &BottleneckAnalyzer) -> Self {
        let now = engine.now();
        let completed = engine.heats_completed();
        let throughput = if now > 0.0 {
            completed as f64 / now * MINUTES_PER_DAY
        } else {
            0.0
        };
        let yield_pct = if completed > 0 {
            let good = completed.saturating_sub(engine.heats_below_critical());
            good as f64 / completed as f64 * 100.0
        } else {
            0.0
        };
        let availability = {
            let per_unit: Vec<f64> = engine
                .units()
                .values()
                .map(|u| u.totals_at(now).availability_pct())
                .collect();
            if per_unit.is_empty() {
                0.0
            } else {
                per_unit.iter().sum::<f64>() / per_unit.len() as f64
            }
        };
        Self {
            simulation_time: now,
            heats_processed: engine.heats_created(),
            heats_completed: completed,
            bottlenecks: analyzer
                .identify_bottlenecks()
                .into_iter()
                .map(|b| b.unit)
                .collect(),
            throughput,
            yield_pct,
            availability,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Simulation;
    use meltshop_core::test_utils::scenario_config;

    #[test]
    fn empty_run_has_zero_rates() {
        let sim = Simulation::new(scenario_config()).unwrap();
        let s = RunSummary::collect(sim.engine(), sim.analyzer());
        assert_eq!(s.simulation_time, 0.0);
        assert_eq!(s.throughput, 0.0);
        assert_eq!(s.yield_pct, 0.0);
        assert_eq!(s.availability, 0.0);
    }

    #[test]
    fn scenario_summary() {
        let mut sim = Simulation::new(scenario_config()).unwrap();
        let s = sim.run_headless(200.0);
        assert_eq!(s.simulation_time, 200.0);
        assert_eq!(s.heats_processed, 1);
        assert_eq!(s.heats_completed, 1);
        assert!((s.throughput - 7.2).abs() < 1e-9);
        assert!(s.availability > 0.0 && s.availability <= 100.0);
    }

    #[test]
    fn json_uses_flat_keys() {
        let s = RunSummary {
            simulation_time: 1440.0,
            heats_processed: 24,
            heats_completed: 20,
            bottlenecks: vec!["bay1_LMF_1".to_string()],
            throughput: 20.0,
            yield_pct: 95.0,
            availability: 70.0,
        };
        let value: serde_json::Value = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        assert_eq!(value["yield"], 95.0);
        assert_eq!(value["bottlenecks"][0], "bay1_LMF_1");
        assert_eq!(value["heats_completed"], 20);
    }
}
