//! Heats: batches of liquid steel tracked from tapping to casting.

use crate::grade::SteelGrade;
use crate::id::{HeatId, LadleId, UnitId};
use crate::unit::UnitType;
use serde::{Deserialize, Serialize};

/// Ambient temperature; heats never cool below it.
pub const AMBIENT_TEMPERATURE: f64 = 20.0;

/// Below this a heat is reported as critically cold.
pub const LOW_TEMPERATURE_WARNING: f64 = 1480.0;

pub const DEFAULT_SLAB_WIDTH: f64 = 1500.0;
pub const DEFAULT_SLAB_THICKNESS: f64 = 250.0;

/// Where a heat is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatStage {
    /// Generated, not yet accepted by the first unit of its route.
    Created,
    /// Waiting in a unit's process queue.
    Queued,
    Processing,
    /// Held hot at an LMF until downstream is ready.
    Warming,
    /// Finished at a unit, waiting for a ladle car.
    AwaitingTransport,
    InTransit,
    Complete,
}

/// One entry of a heat's process history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub unit_type: UnitType,
    pub unit: String,
    pub bay: String,
    pub start: f64,
    pub end: f64,
}

impl ProcessRecord {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heat {
    pub id: HeatId,
    pub grade: SteelGrade,
    /// Bay the heat was generated for.
    pub bay: String,
    pub created_at: f64,
    pub width: f64,
    pub thickness: f64,
    pub stage: HeatStage,
    pub current_unit: Option<UnitId>,
    pub ladle: Option<LadleId>,
    /// Set when the caster received the heat below its critical temperature.
    pub cast_below_critical: bool,
    temperature: f64,
    last_temp_update: f64,
    history: Vec<ProcessRecord>,
    completion_time: Option<f64>,
    cold_warned: bool,
}

impl Heat {
    pub fn new(id: HeatId, grade: SteelGrade, bay: impl Into<String>, created_at: f64) -> Self {
        Self {
            id,
            grade,
            bay: bay.into(),
            created_at,
            width: DEFAULT_SLAB_WIDTH,
            thickness: DEFAULT_SLAB_THICKNESS,
            stage: HeatStage::Created,
            current_unit: None,
            ladle: None,
            cast_below_critical: false,
            temperature: grade.initial_temperature(),
            last_temp_update: created_at,
            history: Vec::new(),
            completion_time: None,
            cold_warned: false,
        }
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Apply linear cooling since the last update. Calls with a time at or
    /// before the last update change nothing.
    pub fn update_temperature(&mut self, now: f64) -> f64 {
        if now <= self.last_temp_update {
            return self.temperature;
        }
        let elapsed = now - self.last_temp_update;
        self.temperature = (self.temperature - elapsed * self.grade.temperature_loss_rate())
            .max(AMBIENT_TEMPERATURE);
        self.last_temp_update = now;

        if self.temperature < LOW_TEMPERATURE_WARNING && !self.cold_warned {
            self.cold_warned = true;
            tracing::warn!(
                component = "heat",
                heat = %self.id,
                temperature = self.temperature,
                "heat temperature critically low"
            );
        }
        self.temperature
    }

    /// Append a process step. History is append-only.
    pub fn record_process(
        &mut self,
        unit_type: UnitType,
        unit: impl Into<String>,
        bay: impl Into<String>,
        start: f64,
        end: f64,
    ) {
        self.history.push(ProcessRecord {
            unit_type,
            unit: unit.into(),
            bay: bay.into(),
            start,
            end,
        });
    }

    pub fn history(&self) -> &[ProcessRecord] {
        &self.history
    }

    /// Total minutes spent at units of the given type.
    pub fn total_time_at(&self, unit_type: UnitType) -> f64 {
        self.history
            .iter()
            .filter(|r| r.unit_type == unit_type)
            .map(ProcessRecord::duration)
            .sum()
    }

    /// Set the completion time. Only the first call has an effect; returns
    /// whether this call completed the heat.
    pub fn mark_complete(&mut self, at: f64) -> bool {
        if self.completion_time.is_some() {
            return false;
        }
        self.completion_time = Some(at);
        self.stage = HeatStage::Complete;
        self.current_unit = None;
        true
    }

    pub fn completion_time(&self) -> Option<f64> {
        self.completion_time
    }

    pub fn is_complete(&self) -> bool {
        self.completion_time.is_some()
    }

    /// Minutes from creation to completion.
    pub fn cycle_time(&self) -> Option<f64> {
        self.completion_time.map(|t| t - self.created_at)
    }
}
