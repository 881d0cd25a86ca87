//! Production units: EAF, LMF, degasser and caster.
//!
//! All four share one lifecycle. Heats wait in a bounded FIFO queue, occupy
//! one of `capacity` processing slots for a grade-dependent time, then leave
//! for the next route step. An LMF whose downstream unit cannot take the heat
//! keeps it in a warming slot, re-checked every minute, until downstream
//! frees up or the maximum warming time forces it out.

use crate::capability::{MetricSource, Schedulable};
use crate::config::UnitParams;
use crate::fixed::{SimTime, minutes, to_minutes};
use crate::grade::SteelGrade;
use crate::heat::{Heat, HeatStage, LOW_TEMPERATURE_WARNING};
use crate::id::HeatId;
use crate::metrics::{StateClock, TimeBucket, UnitCategory, UnitSample, mean, push_bounded};
use crate::scheduler::Wake;
use meltshop_spatial::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Extra EAF minutes when an LMF in the same bay is backed up.
pub const EAF_CONGESTION_PENALTY: f64 = 10.0;

/// Longest an LMF holds a finished heat for downstream, minutes.
pub const MAX_WARMING_TIME: f64 = 15.0;

/// Warming heats are re-checked at this interval, minutes.
const WARMING_POLL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitType {
    #[serde(rename = "EAF")]
    Eaf,
    #[serde(rename = "LMF")]
    Lmf,
    Degasser,
    Caster,
}

impl UnitType {
    pub const ALL: [UnitType; 4] = [
        UnitType::Eaf,
        UnitType::Lmf,
        UnitType::Degasser,
        UnitType::Caster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Eaf => "EAF",
            UnitType::Lmf => "LMF",
            UnitType::Degasser => "Degasser",
            UnitType::Caster => "Caster",
        }
    }

    /// Minutes to process a heat of `grade`, given the configured base and
    /// floor. The floor is never undercut.
    pub fn process_time(&self, params: &UnitParams, grade: SteelGrade) -> f64 {
        let adjustment = match (self, grade) {
            (UnitType::Eaf, SteelGrade::HighClean) => 18.0,
            (UnitType::Eaf, SteelGrade::Decarb) => 12.0,
            (UnitType::Lmf, SteelGrade::HighClean) => 15.0,
            (UnitType::Lmf, SteelGrade::Decarb) => 10.0,
            (UnitType::Lmf, SteelGrade::TempSensitive) => 5.0,
            (UnitType::Degasser, SteelGrade::Decarb) => 5.0,
            _ => 0.0,
        };
        (params.process_time + adjustment).max(params.min_process_time)
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    Idle,
    Processing,
    /// Every slot busy and heats queued behind them.
    Waiting,
    /// Slots held by warming heats that cannot leave.
    Blocked,
}

impl UnitState {
    fn bucket(self) -> TimeBucket {
        match self {
            UnitState::Idle => TimeBucket::Idle,
            UnitState::Processing => TimeBucket::Busy,
            UnitState::Waiting => TimeBucket::Waiting,
            UnitState::Blocked => TimeBucket::Blocked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub heat: HeatId,
    pub started: f64,
    pub finishes: SimTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Queued {
    heat: HeatId,
    since: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmingSlot {
    pub heat: HeatId,
    pub since: f64,
}

/// Inputs a unit needs from the rest of the plant for one step.
pub struct UnitStepCtx<'a> {
    pub heats: &'a mut BTreeMap<HeatId, Heat>,
    /// Whether the next route step can take each heat held here.
    pub downstream_ready: &'a BTreeMap<HeatId, bool>,
    /// An LMF in this unit's bay has a queue longer than one.
    pub lmf_congested: bool,
}

/// What a unit step produced.
#[derive(Debug, Default)]
pub struct UnitStep {
    /// Heats that left the unit and need their next route step.
    pub finished: Vec<HeatId>,
    /// Heats that started processing this step.
    pub started: Vec<HeatId>,
    pub state_change: Option<(UnitState, UnitState)>,
    pub wake: Option<Wake>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionUnit {
    pub name: String,
    pub bay: String,
    pub unit_type: UnitType,
    pub position: Point,
    params: UnitParams,
    /// Casters flag heats arriving below this temperature.
    critical_temp: f64,
    queue: VecDeque<Queued>,
    active: Vec<Slot>,
    warming: VecDeque<WarmingSlot>,
    state: UnitState,
    clock: StateClock,
    heats_processed: u64,
    below_critical: u64,
    wait_history: VecDeque<f64>,
    cycle_history: VecDeque<f64>,
}

impl ProductionUnit {
    pub fn new(
        name: impl Into<String>,
        bay: impl Into<String>,
        unit_type: UnitType,
        position: Point,
        params: UnitParams,
        critical_temp: f64,
    ) -> Self {
        Self {
            name: name.into(),
            bay: bay.into(),
            unit_type,
            position,
            params,
            critical_temp,
            queue: VecDeque::new(),
            active: Vec::new(),
            warming: VecDeque::new(),
            state: UnitState::Idle,
            clock: StateClock::new(0.0),
            heats_processed: 0,
            below_critical: 0,
            wait_history: VecDeque::new(),
            cycle_history: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity as usize
    }

    pub fn max_queue(&self) -> usize {
        self.capacity() * 2
    }

    pub fn params(&self) -> &UnitParams {
        &self.params
    }

    /// Apply new timing parameters. Capacity changes take effect for slots
    /// freed after the call; heats already held are never dropped.
    pub fn set_params(&mut self, params: UnitParams, critical_temp: f64) {
        self.params = params;
        self.critical_temp = critical_temp;
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active(&self) -> &[Slot] {
        &self.active
    }

    pub fn warming(&self) -> impl Iterator<Item = &WarmingSlot> {
        self.warming.iter()
    }

    pub fn queued_heats(&self) -> impl Iterator<Item = HeatId> + '_ {
        self.queue.iter().map(|q| q.heat)
    }

    /// Every heat held here, in slots, warming or queued.
    pub fn holds(&self, heat: HeatId) -> bool {
        self.active.iter().any(|s| s.heat == heat)
            || self.warming.iter().any(|w| w.heat == heat)
            || self.queue.iter().any(|q| q.heat == heat)
    }

    pub fn heats_processed(&self) -> u64 {
        self.heats_processed
    }

    /// Heats cast below the critical temperature.
    pub fn below_critical(&self) -> u64 {
        self.below_critical
    }

    fn occupied_slots(&self) -> usize {
        self.active.len() + self.warming.len()
    }

    /// Whether the queue has room.
    pub fn can_accept(&self) -> bool {
        self.queue.len() < self.max_queue()
    }

    /// A slot is free and nothing is queued ahead of a new heat.
    pub fn is_available(&self) -> bool {
        self.occupied_slots() < self.capacity() && self.queue.is_empty()
    }

    /// Queue a heat. Fails when the queue is full or the heat is already here.
    pub fn add_heat(&mut self, heat: HeatId, now: f64) -> bool {
        if !self.can_accept() || self.holds(heat) {
            return false;
        }
        self.queue.push_back(Queued { heat, since: now });
        true
    }

    pub fn totals_at(&self, now: f64) -> crate::metrics::StateTotals {
        self.clock.totals_at(now)
    }

    /// Run one resumption at `now`.
    pub fn step(&mut self, now: SimTime, ctx: &mut UnitStepCtx<'_>) -> UnitStep {
        let now_f = to_minutes(now);
        let mut out = UnitStep::default();

        self.complete_finished(now, now_f, ctx, &mut out);
        self.release_warming(now_f, ctx, &mut out);
        self.start_queued(now, now_f, ctx, &mut out);

        let next = if !self.active.is_empty() {
            if self.queue.is_empty() || self.occupied_slots() < self.capacity() {
                UnitState::Processing
            } else {
                UnitState::Waiting
            }
        } else if !self.warming.is_empty() {
            UnitState::Blocked
        } else {
            UnitState::Idle
        };
        if next != self.state {
            out.state_change = Some((self.state, next));
            self.clock.transition(next.bucket(), now_f);
            self.state = next;
        }

        let mut wake = Wake::Passivate;
        if let Some(finish) = self.active.iter().map(|s| s.finishes).min() {
            wake = wake.min(Wake::Hold(finish.saturating_sub(now)));
        }
        if !self.warming.is_empty() {
            wake = wake.min(Wake::after(WARMING_POLL));
        }
        out.wake = Some(wake);
        out
    }

    fn complete_finished(
        &mut self,
        now: SimTime,
        now_f: f64,
        ctx: &mut UnitStepCtx<'_>,
        out: &mut UnitStep,
    ) {
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].finishes > now {
                i += 1;
                continue;
            }
            let slot = self.active.remove(i);
            self.heats_processed += 1;
            push_bounded(&mut self.cycle_history, now_f - slot.started);

            let Some(heat) = ctx.heats.get_mut(&slot.heat) else {
                continue;
            };
            heat.record_process(self.unit_type, &self.name, &self.bay, slot.started, now_f);
            heat.update_temperature(now_f);

            let ready = ctx.downstream_ready.get(&slot.heat).copied().unwrap_or(true);
            if self.unit_type == UnitType::Lmf && !ready {
                heat.stage = HeatStage::Warming;
                tracing::info!(
                    component = "unit",
                    unit = %self.name,
                    heat = %slot.heat,
                    "downstream not ready, heat moved to warming"
                );
                self.warming.push_back(WarmingSlot {
                    heat: slot.heat,
                    since: now_f,
                });
            } else {
                heat.stage = HeatStage::AwaitingTransport;
                out.finished.push(slot.heat);
            }
        }
    }

    fn release_warming(&mut self, now_f: f64, ctx: &mut UnitStepCtx<'_>, out: &mut UnitStep) {
        let mut kept = VecDeque::with_capacity(self.warming.len());
        while let Some(w) = self.warming.pop_front() {
            let Some(heat) = ctx.heats.get_mut(&w.heat) else {
                continue;
            };
            let temperature = heat.update_temperature(now_f);
            let ready = ctx.downstream_ready.get(&w.heat).copied().unwrap_or(true);
            let elapsed = now_f - w.since;

            if elapsed >= MAX_WARMING_TIME {
                tracing::warn!(
                    component = "unit",
                    unit = %self.name,
                    heat = %w.heat,
                    temperature,
                    "maximum warming time reached, forcing heat downstream"
                );
            } else if !(ready && temperature > LOW_TEMPERATURE_WARNING) {
                kept.push_back(w);
                continue;
            }
            heat.stage = HeatStage::AwaitingTransport;
            out.finished.push(w.heat);
        }
        self.warming = kept;
    }

    fn start_queued(
        &mut self,
        now: SimTime,
        now_f: f64,
        ctx: &mut UnitStepCtx<'_>,
        out: &mut UnitStep,
    ) {
        while self.occupied_slots() < self.capacity() {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            let Some(heat) = ctx.heats.get_mut(&next.heat) else {
                continue;
            };
            push_bounded(&mut self.wait_history, now_f - next.since);
            let temperature = heat.update_temperature(now_f);

            let mut duration = self.unit_type.process_time(&self.params, heat.grade);
            if self.unit_type == UnitType::Eaf && ctx.lmf_congested {
                duration += EAF_CONGESTION_PENALTY;
            }
            if self.unit_type == UnitType::Caster && temperature < self.critical_temp {
                heat.cast_below_critical = true;
                self.below_critical += 1;
                tracing::warn!(
                    component = "unit",
                    unit = %self.name,
                    heat = %next.heat,
                    temperature,
                    critical = self.critical_temp,
                    "heat below critical casting temperature"
                );
            }

            heat.stage = HeatStage::Processing;
            tracing::debug!(
                component = "unit",
                unit = %self.name,
                heat = %next.heat,
                duration,
                "processing started"
            );
            self.active.push(Slot {
                heat: next.heat,
                started: now_f,
                finishes: now.saturating_add(minutes(duration)),
            });
            out.started.push(next.heat);
        }
    }
}

impl Schedulable for ProductionUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn bay(&self) -> &str {
        &self.bay
    }

    fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn is_available(&self) -> bool {
        ProductionUnit::is_available(self)
    }
}

impl MetricSource for ProductionUnit {
    fn sample(&self, now: f64) -> UnitSample {
        UnitSample {
            name: self.name.clone(),
            category: UnitCategory::Production,
            kind: self.unit_type.as_str().to_string(),
            bay: self.bay.clone(),
            totals: self.clock.totals_at(now),
            queue_length: self.queue.len(),
            wait_time: mean(self.wait_history.iter().copied()),
            cycle_time: mean(self.cycle_history.iter().copied()),
            process_time: Some(self.params.process_time),
            heats_processed: self.heats_processed,
        }
    }
}
