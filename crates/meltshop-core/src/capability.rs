//! Role interfaces shared by equipment types.
//!
//! The route manager and transport coordinator are written against these
//! traits rather than concrete types, so each role is queried the same way
//! regardless of which equipment implements it.

use crate::metrics::UnitSample;
use crate::unit::UnitType;
use meltshop_spatial::CarType;

/// Equipment that accepts heats into a process queue.
pub trait Schedulable {
    fn name(&self) -> &str;
    fn bay(&self) -> &str;
    fn unit_type(&self) -> UnitType;
    fn queue_len(&self) -> usize;
    /// Can take a heat right now without queueing behind others.
    fn is_available(&self) -> bool;
}

/// Equipment that carries ladles between bays.
pub trait Transportable {
    fn name(&self) -> &str;
    fn car_type(&self) -> CarType;
    fn current_bay(&self) -> &str;
    fn home_bay(&self) -> &str;
    /// Idle with no heat and no destination.
    fn is_available(&self) -> bool;
}

/// Equipment the analyzer samples.
pub trait MetricSource {
    fn sample(&self, now: f64) -> UnitSample;
}
