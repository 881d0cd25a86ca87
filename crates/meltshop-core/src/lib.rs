//! Meltshop Core -- the discrete-event engine of a steel-plant simulator.
//!
//! This crate drives heats of steel through a grade-dependent sequence of
//! production units (EAF, LMF, degasser, caster), moved between them by
//! ladle cars and overhead cranes, on a deterministic fixed-point clock.
//!
//! # Cooperative tasks
//!
//! Every piece of equipment is an explicit state machine. The
//! [`scheduler::Scheduler`] resumes one task at a time in `(time, sequence)`
//! order; each resumption runs a `step(now)` that returns when it wants to
//! run again ([`scheduler::Wake`]). Waiting for a free crane or car is a short
//! poll, never a block.
//!
//! ```rust,ignore
//! let mut engine = Engine::new(PlantConfig::default())?;
//! engine.advance(1440.0);
//! let snapshot = engine.snapshot_reader().load();
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Production orchestrator: owns the plant and runs
//!   heat generation, routing, transport and equipment tasks.
//! - [`config::PlantConfig`] -- Plain-data configuration, validated into an
//!   immutable `Arc` snapshot and swapped whole on reconfiguration.
//! - [`crane::Crane`], [`ladle_car::LadleCar`], [`unit::ProductionUnit`] --
//!   Equipment state machines.
//! - [`transport::TransportCoordinator`] -- Priority queue of transport
//!   requests, served in bounded batches by the nearest idle car.
//! - [`route::RouteManager`] -- Per-heat routes with concrete unit picks.
//! - [`event::EventBus`] -- Typed plant events with buffered delivery.
//! - [`query::SnapshotReader`] -- Whole-plant snapshots for other threads.
//! - [`fixed::SimTime`] -- Q32.32 fixed-point clock for exact ordering.

pub mod capability;
pub mod config;
pub mod crane;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixed;
pub mod grade;
pub mod heat;
pub mod id;
pub mod ladle;
pub mod ladle_car;
pub mod metrics;
pub mod query;
pub mod rng;
pub mod route;
pub mod scheduler;
pub mod sim;
pub mod transport;
pub mod unit;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
