//! Property-based tests for bottleneck scoring.

use meltshop_core::config::AnalyticsConfig;
use meltshop_core::metrics::UnitCategory;
use meltshop_core::test_utils::sample;
use meltshop_stats::{BottleneckAnalyzer, Severity};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// (utilization, queue length, wait) for one unit.
fn arb_reading() -> impl Strategy<Value = (f64, usize, f64)> {
    (0.0..=1.0f64, 0..6usize, 0.0..60.0f64)
}

fn arb_category() -> impl Strategy<Value = UnitCategory> {
    prop_oneof![
        Just(UnitCategory::Production),
        Just(UnitCategory::Crane),
        Just(UnitCategory::LadleCar),
    ]
}

fn expected_score(cfg: &AnalyticsConfig, (u, q, w): (f64, usize, f64)) -> u32 {
    let mut score = 0;
    if u >= cfg.high_utilization {
        score += 2;
    }
    if q as f64 >= cfg.queue_alert {
        score += 1;
    }
    if w >= cfg.wait_alert {
        score += 1;
    }
    score
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A single reading is reported exactly when it scores at least 2, with
    /// severity following the score.
    #[test]
    fn score_follows_thresholds(reading in arb_reading(), category in arb_category()) {
        let cfg = AnalyticsConfig::default();
        let mut analyzer = BottleneckAnalyzer::new(cfg.clone());
        analyzer.record(10.0, &[sample("X", category, reading.0, reading.1, reading.2)]);
        // Score against the utilization as the sample reports it.
        let u = sample("X", category, reading.0, 0, 0.0).totals.utilization();
        let score = expected_score(&cfg, (u, reading.1, reading.2));
        let found = analyzer.identify_bottlenecks();
        if score >= 2 {
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(found[0].score, score);
            let severity = if score >= 3 { Severity::High } else { Severity::Medium };
            prop_assert_eq!(found[0].severity, severity);
        } else {
            prop_assert!(found.is_empty());
        }
    }

    /// The report is sorted by score, and every flagged cause gets advice.
    #[test]
    fn report_is_sorted_and_advised(readings in proptest::collection::vec(arb_reading(), 1..8)) {
        let mut analyzer = BottleneckAnalyzer::new(AnalyticsConfig::default());
        let samples: Vec<_> = readings
            .iter()
            .enumerate()
            .map(|(i, r)| sample(&format!("unit_{i}"), UnitCategory::Production, r.0, r.1, r.2))
            .collect();
        analyzer.record(10.0, &samples);
        let found = analyzer.identify_bottlenecks();
        prop_assert!(found.len() <= readings.len());
        for pair in found.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        let causes: usize = found.iter().map(|b| b.causes.len()).sum();
        let layout = usize::from(found.len() > 1);
        let info = usize::from(found.is_empty());
        prop_assert_eq!(analyzer.recommend_improvements(&found).len(), causes + layout + info);
    }
}
