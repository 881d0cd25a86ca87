//! Read-only views of plant state for observers on other threads.
//!
//! The engine publishes a fresh [`PlantSnapshot`] after every `advance`
//! through an [`ArcSwap`]. Readers get a whole snapshot or nothing: fields
//! that change together (a crane's state and the time it entered it, a car's
//! position and path progress) are always seen together. All types are owned
//! copies with no references into engine storage.

use crate::crane::CraneState;
use crate::id::HeatId;
use crate::ladle::LadleStats;
use crate::ladle_car::{CarStatus, PathProgress};
use crate::metrics::StateTotals;
use crate::unit::{UnitState, UnitType};
use arc_swap::ArcSwap;
use meltshop_spatial::{CarType, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub name: String,
    pub bay: String,
    pub unit_type: UnitType,
    pub state: UnitState,
    pub queue_length: usize,
    pub processing: Vec<HeatId>,
    pub warming: Vec<HeatId>,
    pub heats_processed: u64,
    pub totals: StateTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraneView {
    pub name: String,
    pub bay: String,
    pub state: CraneState,
    pub position: Point,
    pub heat: Option<HeatId>,
    pub holding_ladle: bool,
    pub queue_length: usize,
    pub tasks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarView {
    pub name: String,
    pub car_type: CarType,
    pub status: CarStatus,
    pub current_bay: String,
    pub destination_bay: Option<String>,
    pub heat: Option<HeatId>,
    pub position: Point,
    pub progress: PathProgress,
    pub distance_traveled: f64,
}

/// Everything an observer can see at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantSnapshot {
    /// Clock value, minutes.
    pub now: f64,
    pub heats_created: u64,
    pub heats_completed: u64,
    pub heats_in_process: usize,
    pub pending_transports: usize,
    pub units: Vec<UnitView>,
    pub cranes: Vec<CraneView>,
    pub cars: Vec<CarView>,
    pub ladles: LadleStats,
}

impl PlantSnapshot {
    pub fn unit(&self, name: &str) -> Option<&UnitView> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Cheap, cloneable handle for polling the latest snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    cell: Arc<ArcSwap<PlantSnapshot>>,
}

impl SnapshotReader {
    pub(crate) fn new(cell: Arc<ArcSwap<PlantSnapshot>>) -> Self {
        Self { cell }
    }

    /// The most recently published snapshot.
    pub fn load(&self) -> Arc<PlantSnapshot> {
        self.cell.load_full()
    }
}
