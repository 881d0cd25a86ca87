//! Runs the meltshop: an [`Engine`] paired with a [`BottleneckAnalyzer`]
//! that samples every piece of equipment on the configured interval.
//!
//! [`Simulation`] is what front ends drive. [`Simulation::run_headless`]
//! runs for a fixed time and returns the flat [`RunSummary`] the `meltshop`
//! binary prints.

pub mod logging;
pub mod summary;

use std::sync::Arc;

use meltshop_core::config::{ConfigError, PlantConfig};
use meltshop_core::engine::Engine;
use meltshop_core::sim::AdvanceResult;
use meltshop_stats::{
    AnalyticsError, AnalyticsReport, Bottleneck, BottleneckAnalyzer, PlantTotals, UnitAnalytics,
};

pub use summary::RunSummary;

/// Slack when comparing the clock against the next sampling time.
const SAMPLE_EPSILON: f64 = 1e-6;

/// Engine plus analyzer, advanced together.
#[derive(Debug)]
pub struct Simulation {
    engine: Engine,
    analyzer: BottleneckAnalyzer,
    next_sample_at: f64,
}

impl Simulation {
    pub fn new(config: PlantConfig) -> Result<Self, ConfigError> {
        Self::from_validated(config.validate()?)
    }

    pub fn from_validated(config: Arc<PlantConfig>) -> Result<Self, ConfigError> {
        let analyzer = BottleneckAnalyzer::new(config.analytics.clone());
        let engine = Engine::from_validated(config)?;
        Ok(Self {
            engine,
            analyzer,
            next_sample_at: 0.0,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn analyzer(&self) -> &BottleneckAnalyzer {
        &self.analyzer
    }

    pub fn now(&self) -> f64 {
        self.engine.now()
    }

    /// Swap the plant configuration and the analyzer thresholds together.
    pub fn reconfigure(&mut self, config: PlantConfig) -> Result<(), ConfigError> {
        self.engine.reconfigure(config)?;
        self.analyzer.set_config(self.engine.config().analytics.clone());
        Ok(())
    }

    /// Advance `duration` minutes, stopping at every sampling time on the
    /// way to record metrics.
    pub fn advance(&mut self, duration: f64) -> AdvanceResult {
        let end = self.engine.now() + duration.max(0.0);
        let mut steps_run = 0;
        self.sample_if_due();
        while !self.engine.is_paused() && self.engine.now() + SAMPLE_EPSILON < end {
            let chunk_end = self.next_sample_at.min(end);
            let chunk = (chunk_end - self.engine.now()).max(SAMPLE_EPSILON);
            steps_run += self.engine.advance(chunk).steps_run;
            self.sample_if_due();
        }
        AdvanceResult {
            steps_run,
            now: self.engine.clock(),
        }
    }

    /// Run the next instant's tasks, sampling if a sampling time was reached.
    pub fn step(&mut self) -> AdvanceResult {
        let result = self.engine.step();
        self.sample_if_due();
        result
    }

    fn sample_if_due(&mut self) {
        let now = self.engine.now();
        if now + SAMPLE_EPSILON < self.next_sample_at {
            return;
        }
        self.analyzer.record(now, &self.engine.samples());
        let interval = self.analyzer.config().sample_interval;
        while self.next_sample_at <= now + SAMPLE_EPSILON {
            self.next_sample_at += interval;
        }
    }

    pub fn identify_bottlenecks(&self) -> Vec<Bottleneck> {
        self.analyzer.identify_bottlenecks()
    }

    pub fn generate_analytics_report(&self) -> AnalyticsReport {
        self.analyzer
            .generate_report(&PlantTotals::from_engine(&self.engine))
    }

    pub fn get_unit_analytics(&self, name: &str) -> Result<UnitAnalytics, AnalyticsError> {
        self.analyzer.get_unit_analytics(name)
    }

    /// Run for `duration` minutes and summarize.
    pub fn run_headless(&mut self, duration: f64) -> RunSummary {
        tracing::info!(component = "runner", duration, "headless run started");
        self.advance(duration);
        let summary = RunSummary::collect(&self.engine, &self.analyzer);
        tracing::info!(
            component = "runner",
            heats_completed = summary.heats_completed,
            throughput = summary.throughput,
            bottlenecks = summary.bottlenecks.len(),
            "headless run finished"
        );
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
