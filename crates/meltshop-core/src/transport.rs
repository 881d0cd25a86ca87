//! Transport coordination: matching heats that need moving to ladle cars,
//! and handing out cranes.
//!
//! Requests wait in a max-priority queue (earliest request first among equal
//! priorities). [`TransportCoordinator::process_pending`] looks at no more
//! than [`DEFAULT_BATCH_SIZE`] requests per call so the cost of one call stays
//! bounded however long the queue grows. Requests that cannot be served yet
//! go back into the queue unchanged.
//!
//! # Car selection
//!
//! | source bay vs destination bay | destination | car type    |
//! |-------------------------------|-------------|-------------|
//! | different                     | not caster  | `tapping`   |
//! | same                          | any         | `treatment` |
//! | any                           | caster      | `treatment` |
//!
//! Among available cars of the right type the one whose current bay is
//! closest to the pickup bay wins; ties go to the first car in the fleet.

use crate::capability::Transportable;
use crate::crane::Crane;
use crate::id::{CarId, CraneId, HeatId};
use crate::ladle_car::{CarStatus, LadleCar, PathProgress, Stop};
use crate::unit::UnitType;
use meltshop_spatial::{CarType, SpatialPlanner, path_distance};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Requests examined per `process_pending` call.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Distance assumed between bays the planner knows nothing about.
pub const UNKNOWN_BAY_DISTANCE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
}

/// A heat waiting to be carried from one unit to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub heat: HeatId,
    pub from: Stop,
    pub to: Stop,
    pub car_type: CarType,
    pub priority: i32,
    pub requested_at: f64,
    pub status: RequestStatus,
    pub assigned_car: Option<CarId>,
}

#[derive(Debug, Clone)]
struct Queued {
    request: TransportRequest,
    seq: u64,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap: higher priority, then earlier request, then earlier insert.
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority
            .cmp(&other.request.priority)
            .then_with(|| {
                other
                    .request
                    .requested_at
                    .total_cmp(&self.request.requested_at)
            })
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Car class for a move between two units.
pub fn car_type_for(from_bay: &str, to_bay: &str, to_unit: UnitType) -> CarType {
    if to_unit == UnitType::Caster || from_bay == to_bay {
        CarType::Treatment
    } else {
        CarType::Tapping
    }
}

// ---------------------------------------------------------------------------
// Status reporting
// ---------------------------------------------------------------------------

/// Where a heat stands with respect to transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportStatus {
    Pending {
        requested_at: f64,
        waiting: f64,
    },
    Carrying {
        car: String,
        car_status: CarStatus,
        current_bay: String,
        destination_bay: Option<String>,
        progress: PathProgress,
    },
    NotInTransport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportSummary {
    /// Car count per status name.
    pub cars_by_status: BTreeMap<String, usize>,
    pub pending_requests: usize,
    pub active_transports: usize,
    pub completed_transports: u64,
    pub distance_cache_size: usize,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportCoordinator {
    pending: BinaryHeap<Queued>,
    next_seq: u64,
    /// Heats currently assigned to a car.
    active: BTreeMap<HeatId, CarId>,
    distance_cache: HashMap<(String, String), f64>,
    batch_size: usize,
    completed: u64,
}

impl Default for TransportCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl TransportCoordinator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            pending: BinaryHeap::new(),
            next_seq: 0,
            active: BTreeMap::new(),
            distance_cache: HashMap::new(),
            batch_size: batch_size.max(1),
            completed: 0,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, heat: HeatId) -> bool {
        self.pending.iter().any(|q| q.request.heat == heat)
    }

    /// Car carrying `heat`, if one has been assigned.
    pub fn car_for(&self, heat: HeatId) -> Option<CarId> {
        self.active.get(&heat).copied()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Queue a heat for transport. Returns the car class chosen for it.
    pub fn request_transport(
        &mut self,
        heat: HeatId,
        from: Stop,
        to: Stop,
        to_unit: UnitType,
        priority: i32,
        now: f64,
    ) -> CarType {
        let car_type = car_type_for(&from.bay, &to.bay, to_unit);
        tracing::info!(
            component = "transport",
            %heat,
            from = %from.bay,
            to = %to.bay,
            car_type = car_type.as_str(),
            priority,
            "transport requested"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Queued {
            request: TransportRequest {
                heat,
                from,
                to,
                car_type,
                priority,
                requested_at: now,
                status: RequestStatus::Pending,
                assigned_car: None,
            },
            seq,
        });
        car_type
    }

    /// Try to start cars on the most urgent pending requests.
    ///
    /// Returns every assignment made so the caller can wake those cars.
    pub fn process_pending(
        &mut self,
        cars: &mut SlotMap<CarId, LadleCar>,
        planner: &mut SpatialPlanner,
        now: f64,
    ) -> Vec<(HeatId, CarId)> {
        let mut assigned = Vec::new();
        let mut requeue = Vec::new();
        for _ in 0..self.batch_size {
            let Some(mut item) = self.pending.pop() else {
                break;
            };
            let req = &mut item.request;
            let Some(car_id) = self.closest_car(cars, planner, req.car_type, &req.from.bay) else {
                tracing::debug!(
                    component = "transport",
                    heat = %req.heat,
                    car_type = req.car_type.as_str(),
                    "no car available, requeued"
                );
                requeue.push(item);
                continue;
            };
            let Some(car) = cars.get_mut(car_id) else {
                requeue.push(item);
                continue;
            };
            if car.assign_heat(req.heat, req.from.clone(), req.to.clone(), planner, now) {
                req.status = RequestStatus::Assigned;
                req.assigned_car = Some(car_id);
                tracing::info!(
                    component = "transport",
                    heat = %req.heat,
                    car = %car.name,
                    waited = now - req.requested_at,
                    "car assigned"
                );
                self.active.insert(req.heat, car_id);
                assigned.push((req.heat, car_id));
            } else {
                tracing::warn!(
                    component = "transport",
                    heat = %req.heat,
                    car = %car.name,
                    "assignment failed, requeued"
                );
                requeue.push(item);
            }
        }
        self.pending.extend(requeue);
        assigned
    }

    fn closest_car(
        &mut self,
        cars: &SlotMap<CarId, LadleCar>,
        planner: &mut SpatialPlanner,
        car_type: CarType,
        target_bay: &str,
    ) -> Option<CarId> {
        let mut best: Option<(CarId, f64)> = None;
        for (id, car) in cars {
            if car.car_type() != car_type || !car.is_available() {
                continue;
            }
            let d = self.bay_distance(planner, car.current_bay(), target_bay);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Distance between two bays, cached.
    pub fn bay_distance(&mut self, planner: &mut SpatialPlanner, from: &str, to: &str) -> f64 {
        let key = (from.to_string(), to.to_string());
        if let Some(d) = self.distance_cache.get(&key) {
            return *d;
        }
        let d = if from == to {
            0.0
        } else if let Ok(path) = planner.get_path_between_bays(from, to, None) {
            path_distance(&path)
        } else if let (Some(a), Some(b)) = (planner.bay_center(from), planner.bay_center(to)) {
            a.distance(&b)
        } else {
            tracing::warn!(
                component = "transport",
                from,
                to,
                "no path or position for bays, using default distance"
            );
            UNKNOWN_BAY_DISTANCE
        };
        self.distance_cache.insert(key, d);
        d
    }

    /// A car finished (or abandoned) the trip for `heat`.
    pub fn finish(&mut self, heat: HeatId, delivered: bool) {
        if self.active.remove(&heat).is_some() && delivered {
            self.completed += 1;
        }
    }

    pub fn check_transport_status(
        &self,
        heat: HeatId,
        cars: &SlotMap<CarId, LadleCar>,
        now: f64,
    ) -> TransportStatus {
        if let Some(q) = self.pending.iter().find(|q| q.request.heat == heat) {
            return TransportStatus::Pending {
                requested_at: q.request.requested_at,
                waiting: now - q.request.requested_at,
            };
        }
        let carrying = cars.values().find(|c| c.heat() == Some(heat));
        match carrying {
            Some(car) => TransportStatus::Carrying {
                car: car.name.clone(),
                car_status: car.status(),
                current_bay: car.current_bay().to_string(),
                destination_bay: car.destination().map(|d| d.bay.clone()),
                progress: car.progress(),
            },
            None => TransportStatus::NotInTransport,
        }
    }

    pub fn get_status(&self, cars: &SlotMap<CarId, LadleCar>) -> TransportSummary {
        let mut cars_by_status = BTreeMap::new();
        for car in cars.values() {
            *cars_by_status
                .entry(car.status().as_str().to_string())
                .or_default() += 1;
        }
        TransportSummary {
            cars_by_status,
            pending_requests: self.pending.len(),
            active_transports: self.active.len(),
            completed_transports: self.completed,
            distance_cache_size: self.distance_cache.len(),
        }
    }

    pub fn clear_cache(&mut self) {
        self.distance_cache.clear();
        tracing::info!(component = "transport", "distance cache cleared");
    }
}

/// First crane in `bay` that is idle with an empty queue.
pub fn request_crane(cranes: &SlotMap<CraneId, Crane>, bay: &str) -> Option<CraneId> {
    cranes
        .iter()
        .find_map(|(id, c)| (c.bay == bay && c.is_available()).then_some(id))
}
