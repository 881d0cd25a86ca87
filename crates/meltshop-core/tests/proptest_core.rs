//! Property-based tests for the meltshop core.
//!
//! Uses proptest to generate schedules, queue traffic and plant seeds, then
//! checks the ordering, capacity and bookkeeping invariants hold.

use meltshop_core::engine::Engine;
use meltshop_core::fixed::{minutes, to_minutes};
use meltshop_core::id::{HeatId, UnitId};
use meltshop_core::scheduler::{Scheduler, TaskId};
use meltshop_core::test_utils::*;
use meltshop_core::unit::UnitType;
use proptest::prelude::*;
use slotmap::SlotMap;

// ===========================================================================
// Generators
// ===========================================================================

/// Whole-minute delays for a batch of tasks scheduled at time zero.
fn arb_delays(max_tasks: usize) -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(0..30u32, 1..=max_tasks)
}

/// Queue traffic against a unit: `Some(id)` offers heat `id`, `None` runs
/// nothing and just lets time pass.
fn arb_offers(max_ops: usize) -> impl Strategy<Value = Vec<Option<u32>>> {
    proptest::collection::vec(prop_oneof![3 => (1..20u32).prop_map(Some), 1 => Just(None)], 1..=max_ops)
}

fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn unit_ids(n: usize) -> Vec<UnitId> {
    let mut keys: SlotMap<UnitId, ()> = SlotMap::with_key();
    (0..n).map(|_| keys.insert(())).collect()
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Resumptions come out sorted by time, ties in scheduling order.
    #[test]
    fn scheduler_pops_by_time_then_fifo(delays in arb_delays(24)) {
        let ids = unit_ids(delays.len());
        let mut s = Scheduler::new();
        for (id, d) in ids.iter().zip(&delays) {
            s.schedule(TaskId::Unit(*id), minutes(f64::from(*d)));
        }

        let mut expected: Vec<(u32, usize)> = delays.iter().copied().zip(0..).collect();
        expected.sort_by_key(|&(d, _)| d);

        let mut popped = Vec::new();
        while let Some(task) = s.pop_due(minutes(100.0)) {
            popped.push((task, to_minutes(s.now())));
        }
        prop_assert_eq!(popped.len(), delays.len());
        for ((task, at), (d, i)) in popped.iter().zip(&expected) {
            prop_assert_eq!(*task, TaskId::Unit(ids[*i]));
            prop_assert_eq!(*at, f64::from(*d));
        }
    }

    /// Rescheduling a task any number of times leaves one live resumption.
    #[test]
    fn rescheduling_keeps_one_entry(delays in arb_delays(16)) {
        let mut s = Scheduler::new();
        for d in &delays {
            s.schedule(TaskId::LadleFleet, minutes(f64::from(*d)));
        }
        prop_assert_eq!(s.pending_len(), 1);
        let last = f64::from(*delays.last().unwrap());
        prop_assert_eq!(s.pop_due(minutes(100.0)), Some(TaskId::LadleFleet));
        prop_assert_eq!(to_minutes(s.now()), last);
        prop_assert_eq!(s.pop_due(minutes(100.0)), None);
    }

    /// A unit never queues more than twice its capacity and never holds the
    /// same heat twice.
    #[test]
    fn unit_queue_is_bounded(capacity in 1..4u32, offers in arb_offers(40)) {
        let mut unit = make_unit(UnitType::Lmf, params(30.0, 30.0, capacity));
        let mut accepted = Vec::new();
        for offer in offers.into_iter().flatten() {
            let id = HeatId(offer);
            let was_held = unit.holds(id);
            let was_full = !unit.can_accept();
            let ok = unit.add_heat(id, 0.0);
            prop_assert_eq!(ok, !was_held && !was_full);
            if ok {
                accepted.push(id);
            }
            prop_assert!(unit.queue_len() <= unit.max_queue());
        }
        let queued: Vec<_> = unit.queued_heats().collect();
        prop_assert_eq!(queued, accepted);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    /// Same seed, same run.
    #[test]
    fn engine_is_deterministic_per_seed(seed in arb_seed()) {
        let mut a = Engine::new(seeded_config(seed)).unwrap();
        let mut b = Engine::new(seeded_config(seed)).unwrap();
        a.advance(480.0);
        b.advance(480.0);
        prop_assert!(a.heats_completed() > 0);
        prop_assert_eq!(a.state_hash(), b.state_hash());
        prop_assert_eq!(a.completion_order(), b.completion_order());
        for id in a.completion_order() {
            let at = |e: &Engine| e.heat(*id).and_then(|h| h.completion_time());
            prop_assert_eq!(at(&a), at(&b));
        }
    }

    /// Every heat in process holds exactly one ladle, and completed heats
    /// are recorded once each.
    #[test]
    fn ladles_track_heats_in_process(seed in arb_seed()) {
        let mut engine = Engine::new(seeded_config(seed)).unwrap();
        engine.advance(360.0);
        let snap = engine.snapshot_reader().load();
        let in_process = engine.heats_created() - engine.heats_completed();
        prop_assert_eq!(snap.ladles.in_use as u64, in_process);
        prop_assert_eq!(engine.completion_order().len() as u64, engine.heats_completed());
        let mut order = engine.completion_order().to_vec();
        order.sort();
        order.dedup();
        prop_assert_eq!(order.len() as u64, engine.heats_completed());
        prop_assert_eq!(
            snap.ladles.available + snap.ladles.in_use + snap.ladles.warming + snap.ladles.maintenance,
            snap.ladles.total
        );
    }
}
