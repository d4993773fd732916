//! Run control and synchronization for the Petri resistance-evolution
//! dashboard.
//!
//! The generational simulation itself runs on a remote engine. This crate
//! keeps the local control surface (play, pause, step, reset, speed)
//! consistent with the engine's authoritative state.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `petri-config.yaml`.
//! - [`controller`] -- The [`RunController`] state machine that owns the
//!   current snapshot and serializes mutating engine calls.
//! - [`dispatch`] -- Keyboard command layer with focus and busy guards.
//! - [`engine`] -- [`SimulationEngine`] contract, HTTP client, and an
//!   in-memory stub engine.
//! - [`error`] -- Controller error taxonomy and the surfaced error record.
//! - [`planner`] -- Batch step planning from speed and target generation.
//! - [`prefs`] -- Durable user preferences.
//! - [`reconcile`] -- Organism list deduplication.
//! - [`request`] -- Validated run-creation requests.
//! - [`stats`] -- Display statistics derivation.
//! - [`ticker`] -- Elapsed-time ticker that runs while the engine runs.
//!
//! [`RunController`]: controller::RunController
//! [`SimulationEngine`]: engine::SimulationEngine

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod planner;
pub mod prefs;
pub mod reconcile;
pub mod request;
pub mod stats;
pub mod ticker;

pub use controller::{RenderView, RunController, RunPhase, StepReport};
pub use error::{ControlError, ErrorKind, SurfacedError};
