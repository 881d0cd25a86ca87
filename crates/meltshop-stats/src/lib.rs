//! Bottleneck and metrics analysis for the meltshop.
//!
//! The analyzer is fed [`UnitSample`]s on a fixed interval (see
//! [`AnalyticsConfig::sample_interval`]) and keeps a rolling window of each
//! tracked metric per piece of equipment. From those windows it scores
//! bottlenecks, derives recommendations from a fixed table and assembles the
//! analytics report.
//!
//! # Usage
//!
//! ```ignore
//! let mut analyzer = BottleneckAnalyzer::new(config.analytics.clone());
//! // Every sample interval:
//! analyzer.record(engine.now(), &engine.samples());
//! // Query:
//! let bottlenecks = analyzer.identify_bottlenecks();
//! let report = analyzer.generate_report(&PlantTotals::from_engine(&engine));
//! ```
//!
//! # Scoring
//!
//! Each unit's window averages are compared against the configured
//! thresholds: high utilization adds 2 points, a long queue 1 and a long wait
//! 1. Units scoring at least 2 are bottlenecks, `High` from 3 up. The list is
//! sorted by score, ties kept in the order units were first sampled.

use std::collections::{BTreeMap, HashMap};

use meltshop_core::config::AnalyticsConfig;
use meltshop_core::engine::Engine;
use meltshop_core::metrics::{StateTotals, UnitCategory, UnitSample};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    #[error("unit not found: {0}")]
    UnitNotFound(String),
}

// ---------------------------------------------------------------------------
// RingBuffer: fixed-capacity history
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer of metric values.
///
/// When full, the oldest entry is overwritten. Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a buffer holding `capacity` values. A zero capacity holds one.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: f64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed value, if any.
    pub fn latest(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let idx = if self.head == 0 {
            self.capacity() - 1
        } else {
            self.head - 1
        };
        Some(self.data[idx])
    }

    /// Iterate values from oldest to newest.
    pub fn iter(&self) -> RingBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        RingBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// Mean of the stored values, zero when empty.
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// A copy with a new capacity, keeping the newest values that fit.
    pub fn resized(&self, capacity: usize) -> Self {
        let mut out = Self::new(capacity);
        let values = self.to_vec();
        let skip = values.len().saturating_sub(out.capacity());
        for v in values.into_iter().skip(skip) {
            out.push(v);
        }
        out
    }
}

/// Iterator over [`RingBuffer`] values, oldest to newest.
pub struct RingBufferIter<'a> {
    buffer: &'a RingBuffer,
    index: usize,
    remaining: usize,
}

impl Iterator for RingBufferIter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.buffer.data[self.index];
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RingBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A metric tracked per piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Busy plus waiting share of the time since the previous sample.
    Utilization,
    QueueLength,
    /// Mean queue wait, minutes.
    WaitTime,
    /// Accumulated blocked minutes.
    BlockedTime,
    /// Mean process cycle, minutes.
    CycleTime,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Utilization,
        Metric::QueueLength,
        Metric::WaitTime,
        Metric::BlockedTime,
        Metric::CycleTime,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Window statistics of one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub history: Vec<f64>,
}

impl MetricSummary {
    fn from_buffer(buffer: &RingBuffer) -> Self {
        let history = buffer.to_vec();
        if history.is_empty() {
            return Self::default();
        }
        Self {
            current: buffer.latest().unwrap_or_default(),
            average: buffer.mean(),
            min: history.iter().copied().fold(f64::INFINITY, f64::min),
            max: history.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            history,
        }
    }
}

/// Static facts about a tracked unit, as of its latest sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInfo {
    pub name: String,
    pub category: UnitCategory,
    pub kind: String,
    pub bay: String,
    pub process_time: Option<f64>,
    pub queue_length: usize,
    pub heats_processed: u64,
}

/// Everything the analyzer knows about one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitAnalytics {
    pub info: UnitInfo,
    pub metrics: BTreeMap<Metric, MetricSummary>,
}

#[derive(Debug, Clone)]
struct TrackedUnit {
    latest: UnitSample,
    previous_totals: Option<StateTotals>,
    series: [RingBuffer; 5],
}

impl TrackedUnit {
    fn new(sample: &UnitSample, window: usize) -> Self {
        Self {
            latest: sample.clone(),
            previous_totals: None,
            series: std::array::from_fn(|_| RingBuffer::new(window)),
        }
    }

    fn record(&mut self, sample: &UnitSample) {
        let utilization = window_utilization(self.previous_totals.as_ref(), &sample.totals);
        let values = [
            utilization,
            sample.queue_length as f64,
            sample.wait_time,
            sample.totals.blocked,
            sample.cycle_time,
        ];
        for (buffer, value) in self.series.iter_mut().zip(values) {
            buffer.push(value);
        }
        self.previous_totals = Some(sample.totals);
        self.latest = sample.clone();
    }

    fn series(&self, metric: Metric) -> &RingBuffer {
        &self.series[metric.index()]
    }

    fn analytics(&self) -> UnitAnalytics {
        UnitAnalytics {
            info: UnitInfo {
                name: self.latest.name.clone(),
                category: self.latest.category,
                kind: self.latest.kind.clone(),
                bay: self.latest.bay.clone(),
                process_time: self.latest.process_time,
                queue_length: self.latest.queue_length,
                heats_processed: self.latest.heats_processed,
            },
            metrics: Metric::ALL
                .into_iter()
                .map(|m| (m, MetricSummary::from_buffer(self.series(m))))
                .collect(),
        }
    }
}

/// Utilization over the interval since `previous`, or over the whole run
/// when no time has passed.
fn window_utilization(previous: Option<&StateTotals>, current: &StateTotals) -> f64 {
    if let Some(prev) = previous {
        let delta = StateTotals {
            idle: current.idle - prev.idle,
            busy: current.busy - prev.busy,
            waiting: current.waiting - prev.waiting,
            blocked: current.blocked - prev.blocked,
        };
        if delta.total() > 0.0 {
            return delta.utilization();
        }
    }
    current.utilization()
}

// ---------------------------------------------------------------------------
// Bottlenecks
// ---------------------------------------------------------------------------

/// Why a unit was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    HighUtilization,
    LongQueue,
    LongWait,
}

impl Cause {
    pub const ALL: [Cause; 3] = [Cause::HighUtilization, Cause::LongQueue, Cause::LongWait];

    fn points(self) -> u32 {
        match self {
            Cause::HighUtilization => 2,
            Cause::LongQueue | Cause::LongWait => 1,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Medium,
    High,
}

/// Window averages a bottleneck was judged on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BottleneckMetrics {
    pub utilization: f64,
    pub queue_length: f64,
    pub wait_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub unit: String,
    pub category: UnitCategory,
    pub severity: Severity,
    pub score: u32,
    pub causes: Vec<Cause>,
    pub metrics: BottleneckMetrics,
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Capacity,
    Transport,
    Flow,
    Scheduling,
    Layout,
    Info,
}

/// Recommendation per (equipment category, cause). Rows follow
/// [`UnitCategory`], columns follow [`Cause::ALL`].
const RECOMMENDATIONS: [[RecommendationKind; 3]; 3] = [
    // Production
    [
        RecommendationKind::Capacity,
        RecommendationKind::Flow,
        RecommendationKind::Scheduling,
    ],
    // Crane
    [
        RecommendationKind::Transport,
        RecommendationKind::Transport,
        RecommendationKind::Scheduling,
    ],
    // LadleCar
    [
        RecommendationKind::Transport,
        RecommendationKind::Transport,
        RecommendationKind::Scheduling,
    ],
];

fn category_row(category: UnitCategory) -> usize {
    match category {
        UnitCategory::Production => 0,
        UnitCategory::Crane => 1,
        UnitCategory::LadleCar => 2,
    }
}

/// Table lookup for one flagged cause.
pub fn recommendation_kind(category: UnitCategory, cause: Cause) -> RecommendationKind {
    RECOMMENDATIONS[category_row(category)][cause.index()]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Unit the advice is about; `None` for plant-wide advice.
    pub unit: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub actions: Vec<String>,
}

impl Recommendation {
    fn for_cause(b: &Bottleneck, kind: String, cause: Cause) -> Self {
        let rk = recommendation_kind(b.category, cause);
        let unit = &b.unit;
        let (message, actions) = match rk {
            RecommendationKind::Capacity => (
                format!("Consider adding capacity to {unit} or reducing process time."),
                vec![format!("Increase {kind} capacity"), format!("Optimize {kind} process time")],
            ),
            RecommendationKind::Transport => match b.category {
                UnitCategory::Crane => (
                    format!("Add cranes or shorten lifts to relieve {unit}."),
                    vec!["Add more cranes".to_string(), "Review crane task order".to_string()],
                ),
                _ => (
                    "Add more ladle cars to reduce waiting times.".to_string(),
                    vec!["Add more ladle cars".to_string(), "Optimize ladle car routing".to_string()],
                ),
            },
            RecommendationKind::Flow => (
                format!("Optimize flow into {unit} to reduce queue buildup."),
                vec!["Review upstream processes".to_string(), "Modify heat scheduling".to_string()],
            ),
            RecommendationKind::Scheduling => (
                format!("Improve scheduling to reduce wait times at {unit}."),
                vec![
                    "Implement better scheduling algorithm".to_string(),
                    "Review routing decisions".to_string(),
                ],
            ),
            RecommendationKind::Layout | RecommendationKind::Info => (String::new(), Vec::new()),
        };
        Self {
            kind: rk,
            unit: Some(unit.clone()),
            severity: b.severity,
            message,
            actions,
        }
    }

    fn layout() -> Self {
        Self {
            kind: RecommendationKind::Layout,
            unit: None,
            severity: Severity::Medium,
            message: "Consider revising plant layout to optimize material flow.".to_string(),
            actions: vec![
                "Review distances between units".to_string(),
                "Optimize unit placement".to_string(),
            ],
        }
    }

    fn all_clear() -> Self {
        Self {
            kind: RecommendationKind::Info,
            unit: None,
            severity: Severity::Medium,
            message: "No bottlenecks detected. System is running efficiently.".to_string(),
            actions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Plant-level counters the report needs from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlantTotals {
    pub now: f64,
    pub heats_processed: u64,
    pub heats_completed: u64,
    pub total_cycle_time: f64,
    pub total_distance: f64,
}

impl PlantTotals {
    pub fn from_engine(engine: &Engine) -> Self {
        Self {
            now: engine.now(),
            heats_processed: engine.heats_created(),
            heats_completed: engine.heats_completed(),
            total_cycle_time: engine.heats().filter_map(|h| h.cycle_time()).sum(),
            total_distance: engine.total_distance(),
        }
    }

    pub fn avg_cycle_time(&self) -> f64 {
        if self.heats_completed == 0 {
            return 0.0;
        }
        self.total_cycle_time / self.heats_completed as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub heats_processed: u64,
    pub heats_completed: u64,
    pub completion_rate: f64,
    pub total_simulation_time: f64,
    pub avg_cycle_time: f64,
    pub total_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputAnalysis {
    /// Completed heats per minute.
    pub throughput: f64,
    pub avg_cycle_time: f64,
    pub takt_time: f64,
    pub takt_achievement: f64,
    pub primary_bottleneck: Option<String>,
    /// Heats per minute the primary bottleneck could sustain.
    pub theoretical_max_throughput: f64,
    pub system_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub timestamp: f64,
    pub system_metrics: SystemMetrics,
    /// `None` until at least one heat has completed.
    pub throughput_analysis: Option<ThroughputAnalysis>,
    pub bottlenecks: Vec<Bottleneck>,
    pub recommendations: Vec<Recommendation>,
    pub unit_metrics: Vec<UnitAnalytics>,
}

// ---------------------------------------------------------------------------
// BottleneckAnalyzer
// ---------------------------------------------------------------------------

/// Rolling per-unit metrics and the bottleneck analysis built on them.
#[derive(Debug, Clone)]
pub struct BottleneckAnalyzer {
    config: AnalyticsConfig,
    /// Units in the order they were first sampled.
    units: Vec<TrackedUnit>,
    index: HashMap<String, usize>,
    samples_taken: u64,
    last_sample_at: Option<f64>,
}

impl BottleneckAnalyzer {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            units: Vec::new(),
            index: HashMap::new(),
            samples_taken: 0,
            last_sample_at: None,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Swap thresholds. A new window size keeps the newest samples.
    pub fn set_config(&mut self, config: AnalyticsConfig) {
        if config.window != self.config.window {
            for unit in &mut self.units {
                for buffer in &mut unit.series {
                    *buffer = buffer.resized(config.window);
                }
            }
        }
        self.config = config;
    }

    /// Number of sampling rounds recorded.
    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    pub fn last_sample_at(&self) -> Option<f64> {
        self.last_sample_at
    }

    /// Whether a sample is due at `now`.
    pub fn is_due(&self, now: f64) -> bool {
        self.last_sample_at
            .is_none_or(|last| now - last >= self.config.sample_interval)
    }

    /// Record one sampling round.
    pub fn record(&mut self, now: f64, samples: &[UnitSample]) {
        for sample in samples {
            let idx = match self.index.get(&sample.name) {
                Some(&idx) => idx,
                None => {
                    self.units.push(TrackedUnit::new(sample, self.config.window));
                    self.index.insert(sample.name.clone(), self.units.len() - 1);
                    self.units.len() - 1
                }
            };
            self.units[idx].record(sample);
        }
        self.samples_taken += 1;
        self.last_sample_at = Some(now);
        tracing::debug!(
            component = "analyzer",
            at = now,
            units = samples.len(),
            "metrics sampled"
        );
    }

    /// Names of tracked units, in discovery order.
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.latest.name.as_str())
    }

    /// Score every unit against the thresholds.
    pub fn identify_bottlenecks(&self) -> Vec<Bottleneck> {
        let mut found: Vec<Bottleneck> = self
            .units
            .iter()
            .filter_map(|unit| self.score(unit))
            .collect();
        // Stable: equal scores keep discovery order.
        found.sort_by(|a, b| b.score.cmp(&a.score));

        match found.first() {
            Some(primary) => tracing::info!(
                component = "analyzer",
                count = found.len(),
                primary = %primary.unit,
                "bottlenecks identified"
            ),
            None => tracing::debug!(component = "analyzer", "no bottlenecks identified"),
        }
        found
    }

    fn score(&self, unit: &TrackedUnit) -> Option<Bottleneck> {
        if unit.series(Metric::Utilization).is_empty() {
            return None;
        }
        let metrics = BottleneckMetrics {
            utilization: unit.series(Metric::Utilization).mean(),
            queue_length: unit.series(Metric::QueueLength).mean(),
            wait_time: unit.series(Metric::WaitTime).mean(),
        };
        let causes: Vec<Cause> = Cause::ALL
            .into_iter()
            .filter(|cause| match cause {
                Cause::HighUtilization => metrics.utilization >= self.config.high_utilization,
                Cause::LongQueue => metrics.queue_length >= self.config.queue_alert,
                Cause::LongWait => metrics.wait_time >= self.config.wait_alert,
            })
            .collect();
        let score: u32 = causes.iter().map(|c| c.points()).sum();
        if score < 2 {
            return None;
        }
        Some(Bottleneck {
            unit: unit.latest.name.clone(),
            category: unit.latest.category,
            severity: if score >= 3 { Severity::High } else { Severity::Medium },
            score,
            causes,
            metrics,
        })
    }

    /// Advice for the given bottlenecks, one entry per flagged cause plus a
    /// layout review when more than one unit is flagged.
    pub fn recommend_improvements(&self, bottlenecks: &[Bottleneck]) -> Vec<Recommendation> {
        if bottlenecks.is_empty() {
            return vec![Recommendation::all_clear()];
        }
        let mut out = Vec::new();
        for b in bottlenecks {
            let kind = self
                .index
                .get(&b.unit)
                .map(|&i| self.units[i].latest.kind.clone())
                .unwrap_or_default();
            for cause in &b.causes {
                out.push(Recommendation::for_cause(b, kind.clone(), *cause));
            }
        }
        if bottlenecks.len() > 1 {
            out.push(Recommendation::layout());
        }
        out
    }

    /// Current/average/min/max/history of each metric for one unit.
    pub fn get_unit_analytics(&self, name: &str) -> Result<UnitAnalytics, AnalyticsError> {
        self.index
            .get(name)
            .map(|&i| self.units[i].analytics())
            .ok_or_else(|| AnalyticsError::UnitNotFound(name.to_string()))
    }

    /// Plant throughput against the primary bottleneck and the takt time.
    /// `None` until a heat has completed.
    pub fn throughput_analysis(
        &self,
        plant: &PlantTotals,
        bottlenecks: &[Bottleneck],
    ) -> Option<ThroughputAnalysis> {
        if plant.heats_completed == 0 || plant.now <= 0.0 {
            return None;
        }
        let throughput = plant.heats_completed as f64 / plant.now;
        let avg_cycle_time = plant.avg_cycle_time();
        let primary = bottlenecks.first().map(|b| b.unit.clone());
        let theoretical_max = primary
            .as_deref()
            .and_then(|name| self.index.get(name))
            .and_then(|&i| self.units[i].latest.process_time)
            .filter(|t| *t > 0.0)
            .map_or(0.0, |t| 1.0 / t);
        let takt_time = self.config.takt_time;
        Some(ThroughputAnalysis {
            throughput,
            avg_cycle_time,
            takt_time,
            takt_achievement: if avg_cycle_time > 0.0 {
                takt_time / avg_cycle_time
            } else {
                0.0
            },
            primary_bottleneck: primary,
            theoretical_max_throughput: theoretical_max,
            system_efficiency: if theoretical_max > 0.0 {
                throughput / theoretical_max
            } else {
                0.0
            },
        })
    }

    /// The full point-in-time report.
    pub fn generate_report(&self, plant: &PlantTotals) -> AnalyticsReport {
        let bottlenecks = self.identify_bottlenecks();
        let recommendations = self.recommend_improvements(&bottlenecks);
        let throughput_analysis = self.throughput_analysis(plant, &bottlenecks);
        AnalyticsReport {
            timestamp: plant.now,
            system_metrics: SystemMetrics {
                heats_processed: plant.heats_processed,
                heats_completed: plant.heats_completed,
                completion_rate: if plant.heats_processed > 0 {
                    plant.heats_completed as f64 / plant.heats_processed as f64
                } else {
                    0.0
                },
                total_simulation_time: plant.now,
                avg_cycle_time: plant.avg_cycle_time(),
                total_distance: plant.total_distance,
            },
            throughput_analysis,
            bottlenecks,
            recommendations,
            unit_metrics: self.units.iter().map(TrackedUnit::analytics).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use meltshop_core::test_utils::sample;

    fn analyzer() -> BottleneckAnalyzer {
        BottleneckAnalyzer::new(AnalyticsConfig::default())
    }

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    // -----------------------------------------------------------------------
    // RingBuffer
    // -----------------------------------------------------------------------

    #[test]
    fn ring_buffer_overwrites_oldest() {
        let mut rb = RingBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            rb.push(v);
        }
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(rb.latest(), Some(4.0));
        assert_approx(rb.mean(), 3.0);
    }

    #[test]
    fn ring_buffer_empty() {
        let rb = RingBuffer::new(4);
        assert!(rb.is_empty());
        assert_eq!(rb.latest(), None);
        assert_eq!(rb.mean(), 0.0);
        assert_eq!(rb.iter().len(), 0);
    }

    #[test]
    fn ring_buffer_zero_capacity_holds_one() {
        let mut rb = RingBuffer::new(0);
        rb.push(1.0);
        rb.push(2.0);
        assert_eq!(rb.to_vec(), vec![2.0]);
    }

    #[test]
    fn ring_buffer_resize_keeps_newest() {
        let mut rb = RingBuffer::new(5);
        for v in 1..=5 {
            rb.push(f64::from(v));
        }
        assert_eq!(rb.resized(2).to_vec(), vec![4.0, 5.0]);
        assert_eq!(rb.resized(8).to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    // -----------------------------------------------------------------------
    // Scoring
    // -----------------------------------------------------------------------

    #[test]
    fn all_three_causes_score_four_high() {
        let mut a = analyzer();
        a.record(10.0, &[sample("X", UnitCategory::Production, 0.90, 3, 25.0)]);
        let found = a.identify_bottlenecks();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].unit, "X");
        assert_eq!(found[0].score, 4);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(
            found[0].causes,
            vec![Cause::HighUtilization, Cause::LongQueue, Cause::LongWait]
        );
    }

    #[test]
    fn quiet_unit_is_not_reported() {
        let mut a = analyzer();
        a.record(10.0, &[sample("X", UnitCategory::Production, 0.5, 0, 0.0)]);
        assert!(a.identify_bottlenecks().is_empty());
    }

    #[test]
    fn single_point_is_not_enough() {
        let mut a = analyzer();
        a.record(10.0, &[sample("Q", UnitCategory::Production, 0.1, 5, 0.0)]);
        assert!(a.identify_bottlenecks().is_empty());
    }

    #[test]
    fn utilization_alone_is_medium() {
        let mut a = analyzer();
        a.record(10.0, &[sample("U", UnitCategory::Production, 0.85, 0, 0.0)]);
        let found = a.identify_bottlenecks();
        assert_eq!(found[0].score, 2);
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[test]
    fn queue_and_wait_together_make_a_bottleneck() {
        let mut a = analyzer();
        a.record(10.0, &[sample("C", UnitCategory::LadleCar, 0.2, 2, 20.0)]);
        let found = a.identify_bottlenecks();
        assert_eq!(found[0].score, 2);
        assert_eq!(found[0].causes, vec![Cause::LongQueue, Cause::LongWait]);
    }

    #[test]
    fn sorted_by_score_ties_keep_discovery_order() {
        let mut a = analyzer();
        a.record(
            10.0,
            &[
                sample("first", UnitCategory::Production, 0.9, 0, 0.0),
                sample("second", UnitCategory::Production, 0.9, 3, 25.0),
                sample("third", UnitCategory::Crane, 0.9, 0, 0.0),
            ],
        );
        let names: Vec<_> = a.identify_bottlenecks().into_iter().map(|b| b.unit).collect();
        assert_eq!(names, vec!["second", "first", "third"]);
    }

    #[test]
    fn averages_over_the_window() {
        let mut a = BottleneckAnalyzer::new(AnalyticsConfig {
            window: 2,
            ..AnalyticsConfig::default()
        });
        a.record(10.0, &[sample("X", UnitCategory::Production, 0.5, 10, 0.0)]);
        a.record(20.0, &[sample("X", UnitCategory::Production, 0.5, 0, 0.0)]);
        a.record(30.0, &[sample("X", UnitCategory::Production, 0.5, 0, 0.0)]);
        // The queue of 10 has left the window.
        assert!(a.identify_bottlenecks().is_empty());
    }

    #[test]
    fn utilization_uses_interval_since_previous_sample() {
        let prev = StateTotals {
            busy: 10.0,
            idle: 90.0,
            ..StateTotals::default()
        };
        let now = StateTotals {
            busy: 60.0,
            idle: 90.0,
            ..StateTotals::default()
        };
        assert_approx(window_utilization(Some(&prev), &now), 1.0);
        assert_approx(window_utilization(None, &now), 0.4);
        assert_approx(window_utilization(Some(&now), &now), 0.4);
    }

    // -----------------------------------------------------------------------
    // Recommendations
    // -----------------------------------------------------------------------

    #[test]
    fn recommendation_table_is_total() {
        for category in [UnitCategory::Production, UnitCategory::Crane, UnitCategory::LadleCar] {
            for cause in Cause::ALL {
                let kind = recommendation_kind(category, cause);
                assert!(!matches!(kind, RecommendationKind::Layout | RecommendationKind::Info));
            }
        }
        assert_eq!(
            recommendation_kind(UnitCategory::Production, Cause::HighUtilization),
            RecommendationKind::Capacity
        );
        assert_eq!(
            recommendation_kind(UnitCategory::LadleCar, Cause::LongQueue),
            RecommendationKind::Transport
        );
        assert_eq!(
            recommendation_kind(UnitCategory::Production, Cause::LongQueue),
            RecommendationKind::Flow
        );
        assert_eq!(
            recommendation_kind(UnitCategory::Crane, Cause::LongWait),
            RecommendationKind::Scheduling
        );
    }

    #[test]
    fn no_bottlenecks_gives_info() {
        let recs = analyzer().recommend_improvements(&[]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::Info);
    }

    #[test]
    fn one_recommendation_per_cause_plus_layout() {
        let mut a = analyzer();
        a.record(
            10.0,
            &[
                sample("bay1_EAF_1", UnitCategory::Production, 0.95, 3, 0.0),
                sample("tapping_car_1", UnitCategory::LadleCar, 0.1, 4, 30.0),
            ],
        );
        let found = a.identify_bottlenecks();
        let kinds: Vec<_> = a.recommend_improvements(&found).into_iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::Capacity,
                RecommendationKind::Flow,
                RecommendationKind::Transport,
                RecommendationKind::Scheduling,
                RecommendationKind::Layout,
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Unit analytics and report
    // -----------------------------------------------------------------------

    #[test]
    fn unit_analytics_summarizes_history() {
        let mut a = analyzer();
        a.record(10.0, &[sample("X", UnitCategory::Production, 0.5, 1, 10.0)]);
        a.record(20.0, &[sample("X", UnitCategory::Production, 0.5, 3, 30.0)]);
        let ua = a.get_unit_analytics("X").unwrap();
        let queue = &ua.metrics[&Metric::QueueLength];
        assert_eq!(queue.history, vec![1.0, 3.0]);
        assert_approx(queue.current, 3.0);
        assert_approx(queue.average, 2.0);
        assert_approx(queue.min, 1.0);
        assert_approx(queue.max, 3.0);
        assert_eq!(ua.info.bay, "bay1");
        assert_eq!(ua.metrics.len(), Metric::ALL.len());
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert_eq!(
            analyzer().get_unit_analytics("nope"),
            Err(AnalyticsError::UnitNotFound("nope".to_string()))
        );
    }

    #[test]
    fn sampling_interval_gate() {
        let mut a = analyzer();
        assert!(a.is_due(0.0));
        a.record(0.0, &[]);
        assert!(!a.is_due(9.0));
        assert!(a.is_due(10.0));
        assert_eq!(a.samples_taken(), 1);
    }

    #[test]
    fn throughput_needs_a_completed_heat() {
        let a = analyzer();
        assert!(a.throughput_analysis(&PlantTotals::default(), &[]).is_none());
    }

    #[test]
    fn throughput_against_primary_bottleneck() {
        let mut a = analyzer();
        a.record(100.0, &[sample("bay1_EAF_1", UnitCategory::Production, 0.95, 0, 0.0)]);
        let plant = PlantTotals {
            now: 600.0,
            heats_processed: 10,
            heats_completed: 6,
            total_cycle_time: 720.0,
            total_distance: 0.0,
        };
        let found = a.identify_bottlenecks();
        let t = a.throughput_analysis(&plant, &found).unwrap();
        assert_approx(t.throughput, 0.01);
        assert_approx(t.avg_cycle_time, 120.0);
        assert_approx(t.takt_achievement, 0.5);
        assert_eq!(t.primary_bottleneck.as_deref(), Some("bay1_EAF_1"));
        assert_approx(t.theoretical_max_throughput, 0.02);
        assert_approx(t.system_efficiency, 0.5);
    }

    #[test]
    fn report_collects_every_section() {
        let mut a = analyzer();
        let mut crane = sample("B", UnitCategory::Crane, 0.9, 0, 0.0);
        crane.process_time = None;
        a.record(10.0, &[sample("A", UnitCategory::Production, 0.2, 0, 0.0), crane]);
        let report = a.generate_report(&PlantTotals {
            now: 10.0,
            heats_processed: 4,
            heats_completed: 1,
            total_cycle_time: 100.0,
            total_distance: 250.0,
        });
        assert_eq!(report.timestamp, 10.0);
        assert_approx(report.system_metrics.completion_rate, 0.25);
        assert_eq!(report.system_metrics.total_distance, 250.0);
        assert_eq!(report.bottlenecks.len(), 1);
        assert_eq!(report.recommendations[0].kind, RecommendationKind::Transport);
        assert_eq!(report.unit_metrics.len(), 2);
        let t = report.throughput_analysis.unwrap();
        assert_eq!(t.primary_bottleneck.as_deref(), Some("B"));
        assert_eq!(t.theoretical_max_throughput, 0.0);
    }

    #[test]
    fn window_change_keeps_newest_samples() {
        let mut a = analyzer();
        for (i, q) in [1, 2, 3, 4].into_iter().enumerate() {
            a.record(i as f64 * 10.0, &[sample("X", UnitCategory::Production, 0.1, q, 0.0)]);
        }
        a.set_config(AnalyticsConfig {
            window: 2,
            ..AnalyticsConfig::default()
        });
        let ua = a.get_unit_analytics("X").unwrap();
        assert_eq!(ua.metrics[&Metric::QueueLength].history, vec![3.0, 4.0]);
    }
}
