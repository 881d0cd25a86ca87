//! Ladle fleet: reusable vessels carrying heats between units.
//!
//! Ladles are created once at startup and placed round-robin over the bays.
//! Status changes that depend on elapsed time (warming, maintenance) are
//! applied lazily through [`Ladle::refresh`], so the fleet needs no task of
//! its own beyond the periodic maintenance sweep.

use crate::grade::SteelGrade;
use crate::heat::AMBIENT_TEMPERATURE;
use crate::id::{CarId, CraneId, HeatId, LadleId, UnitId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// Temperature of a freshly assigned ladle, °C.
pub const LADLE_ASSIGN_TEMPERATURE: f64 = 1600.0;

/// Refractory cooling while in use, °C per minute.
pub const LADLE_COOLING_RATE: f64 = 0.1;

/// Wear level at which a ladle is pulled for maintenance.
pub const MAINTENANCE_WEAR: f64 = 0.9;

/// Minutes a maintenance job takes.
pub const MAINTENANCE_TIME: f64 = 30.0;

/// Minutes between maintenance sweeps.
pub const MAINTENANCE_INTERVAL: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LadleStatus {
    Available,
    InUse,
    Warming,
    Maintenance,
}

/// Who physically holds a ladle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadleLocation {
    Yard(String),
    Unit(UnitId),
    Crane(CraneId),
    Car(CarId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ladle {
    pub name: String,
    pub status: LadleStatus,
    pub heat: Option<HeatId>,
    pub temperature: f64,
    pub wear: f64,
    pub heats_processed: u32,
    pub location: LadleLocation,
    pub total_warming_time: f64,
    /// When a warming or maintenance period ends.
    ready_at: Option<f64>,
    last_update: f64,
}

impl Ladle {
    pub fn new(name: impl Into<String>, bay: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LadleStatus::Available,
            heat: None,
            temperature: AMBIENT_TEMPERATURE,
            wear: 0.0,
            heats_processed: 0,
            location: LadleLocation::Yard(bay.into()),
            total_warming_time: 0.0,
            ready_at: None,
            last_update: 0.0,
        }
    }

    /// Apply time-dependent transitions up to `now`.
    pub fn refresh(&mut self, now: f64) {
        match self.status {
            LadleStatus::InUse => {
                let elapsed = (now - self.last_update).max(0.0);
                self.temperature =
                    (self.temperature - elapsed * LADLE_COOLING_RATE).max(AMBIENT_TEMPERATURE);
            }
            LadleStatus::Warming | LadleStatus::Maintenance => {
                if self.ready_at.is_some_and(|t| now >= t) {
                    if self.status == LadleStatus::Maintenance {
                        self.wear = 0.0;
                    }
                    self.status = LadleStatus::Available;
                    self.temperature = AMBIENT_TEMPERATURE;
                    self.ready_at = None;
                }
            }
            LadleStatus::Available => {}
        }
        self.last_update = self.last_update.max(now);
    }

    pub fn is_available(&self) -> bool {
        self.status == LadleStatus::Available
    }

    pub fn needs_maintenance(&self) -> bool {
        self.wear >= MAINTENANCE_WEAR
    }

    /// Attach a heat. Fails unless the ladle is available.
    pub fn assign_heat(&mut self, heat: HeatId, now: f64, max_heats: u32) -> bool {
        self.refresh(now);
        if !self.is_available() {
            return false;
        }
        self.status = LadleStatus::InUse;
        self.heat = Some(heat);
        self.temperature = LADLE_ASSIGN_TEMPERATURE;
        self.heats_processed += 1;
        self.wear = (self.wear + 1.0 / max_heats.max(1) as f64).min(1.0);
        self.last_update = now;
        true
    }

    /// Detach the heat and start the warming period.
    pub fn release(&mut self, now: f64, warming_time: f64) -> Option<HeatId> {
        self.refresh(now);
        let heat = self.heat.take();
        self.status = LadleStatus::Warming;
        self.ready_at = Some(now + warming_time);
        self.total_warming_time += warming_time;
        heat
    }

    /// Start maintenance. Fails unless the ladle is available.
    pub fn start_maintenance(&mut self, now: f64) -> bool {
        self.refresh(now);
        if !self.is_available() {
            return false;
        }
        self.status = LadleStatus::Maintenance;
        self.ready_at = Some(now + MAINTENANCE_TIME);
        true
    }
}

/// Aggregate fleet counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LadleStats {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
    pub warming: usize,
    pub maintenance: usize,
    pub heats_processed: u64,
    pub total_warming_time: f64,
    pub average_wear: f64,
    /// Ladles sitting in each bay's yard.
    pub by_bay: BTreeMap<String, usize>,
}

/// Owns the ladle fleet.
#[derive(Debug, Clone)]
pub struct LadleManager {
    ladles: SlotMap<LadleId, Ladle>,
    warming_time: f64,
    max_heats: u32,
}

impl LadleManager {
    /// Create `count` ladles, placed round-robin over `bays`.
    pub fn new(count: usize, bays: &[String], warming_time: f64, max_heats: u32) -> Self {
        let mut ladles = SlotMap::with_key();
        for i in 0..count {
            let bay = bays.get(i % bays.len().max(1)).cloned().unwrap_or_default();
            ladles.insert(Ladle::new(format!("ladle_{:02}", i + 1), bay));
        }
        tracing::info!(component = "ladles", count, "ladle fleet created");
        Self {
            ladles,
            warming_time,
            max_heats,
        }
    }

    pub fn set_timing(&mut self, warming_time: f64, max_heats: u32) {
        self.warming_time = warming_time;
        self.max_heats = max_heats;
    }

    pub fn get(&self, id: LadleId) -> Option<&Ladle> {
        self.ladles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LadleId, &Ladle)> {
        self.ladles.iter()
    }

    pub fn len(&self) -> usize {
        self.ladles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ladles.is_empty()
    }

    /// First available ladle in the yard of `bay`, else the first available
    /// ladle anywhere.
    pub fn get_available_ladle(
        &mut self,
        grade: SteelGrade,
        bay: Option<&str>,
        now: f64,
    ) -> Option<LadleId> {
        for ladle in self.ladles.values_mut() {
            ladle.refresh(now);
        }
        let in_bay = bay.and_then(|b| {
            self.ladles.iter().find_map(|(id, l)| {
                (l.is_available() && l.location == LadleLocation::Yard(b.to_string())).then_some(id)
            })
        });
        let found = in_bay.or_else(|| {
            self.ladles
                .iter()
                .find_map(|(id, l)| l.is_available().then_some(id))
        });
        if found.is_none() {
            tracing::warn!(component = "ladles", grade = %grade, "no ladle available");
        }
        found
    }

    /// Attach a heat to a ladle.
    pub fn assign(&mut self, id: LadleId, heat: HeatId, now: f64) -> bool {
        let max_heats = self.max_heats;
        self.ladles
            .get_mut(id)
            .is_some_and(|l| l.assign_heat(heat, now, max_heats))
    }

    /// Ladle carrying `heat`, if any.
    pub fn ladle_of(&self, heat: HeatId) -> Option<LadleId> {
        self.ladles
            .iter()
            .find_map(|(id, l)| (l.heat == Some(heat)).then_some(id))
    }

    /// The loaded ladle sitting at `at`, carrying `heat` if one is given.
    /// Lookup only; custody changes go through [`LadleManager::move_to`].
    pub fn find_at(&self, at: &LadleLocation, heat: Option<HeatId>) -> Option<LadleId> {
        self.ladles.iter().find_map(|(id, l)| {
            let matches_heat = heat.is_none_or(|h| l.heat == Some(h));
            (l.heat.is_some() && matches_heat && &l.location == at).then_some(id)
        })
    }

    /// Record a change of custody.
    pub fn move_to(&mut self, id: LadleId, location: LadleLocation) {
        if let Some(l) = self.ladles.get_mut(id) {
            l.location = location;
        }
    }

    /// Move an available ladle to another bay's yard.
    pub fn transfer(&mut self, id: LadleId, to_bay: &str, now: f64) -> bool {
        let Some(ladle) = self.ladles.get_mut(id) else {
            return false;
        };
        ladle.refresh(now);
        if !ladle.is_available() {
            return false;
        }
        tracing::info!(
            component = "ladles",
            ladle = %ladle.name,
            to_bay,
            "ladle transferred"
        );
        ladle.location = LadleLocation::Yard(to_bay.to_string());
        true
    }

    /// Release a ladle into the yard of `bay` and start warming it.
    pub fn release(&mut self, id: LadleId, bay: &str, now: f64) -> Option<HeatId> {
        let warming_time = self.warming_time;
        let ladle = self.ladles.get_mut(id)?;
        ladle.location = LadleLocation::Yard(bay.to_string());
        ladle.release(now, warming_time)
    }

    /// Pull every worn, available ladle into maintenance. Returns how many
    /// jobs were started.
    pub fn run_maintenance(&mut self, now: f64) -> usize {
        let mut started = 0;
        for ladle in self.ladles.values_mut() {
            ladle.refresh(now);
            if ladle.needs_maintenance() && ladle.start_maintenance(now) {
                tracing::info!(
                    component = "ladles",
                    ladle = %ladle.name,
                    wear = ladle.wear,
                    "ladle maintenance started"
                );
                started += 1;
            }
        }
        started
    }

    pub fn stats(&mut self, now: f64) -> LadleStats {
        let mut stats = LadleStats {
            total: self.ladles.len(),
            ..Default::default()
        };
        for ladle in self.ladles.values_mut() {
            ladle.refresh(now);
            match ladle.status {
                LadleStatus::Available => stats.available += 1,
                LadleStatus::InUse => stats.in_use += 1,
                LadleStatus::Warming => stats.warming += 1,
                LadleStatus::Maintenance => stats.maintenance += 1,
            }
            stats.heats_processed += ladle.heats_processed as u64;
            stats.total_warming_time += ladle.total_warming_time;
            stats.average_wear += ladle.wear;
            if let LadleLocation::Yard(bay) = &ladle.location {
                *stats.by_bay.entry(bay.clone()).or_default() += 1;
            }
        }
        if stats.total > 0 {
            stats.average_wear /= stats.total as f64;
        }
        stats
    }
}
