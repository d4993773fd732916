//! Remote simulation engine contract.
//!
//! The engine owns the mutation algorithm and persistence; the control
//! layer only ever sees whole [`Snapshot`] values coming back from it.
//! [`SimulationEngine`] abstracts the transport so the controller can be
//! driven by the [`HttpEngine`] in production and by the
//! [`InMemoryEngine`] stub in tests and offline mode.
//!
//! [`HttpEngine`]: http::HttpEngine
//! [`InMemoryEngine`]: memory::InMemoryEngine

pub mod http;
pub mod memory;

use std::future::Future;

use petri_types::{SaveReceipt, SimulationId, Snapshot, SnapshotSummary, SpeedMultiplier};

use crate::error::ErrorKind;

/// Errors reported by the remote engine or the transport in front of it.
///
/// Transport failures and application errors are distinct variants but the
/// controller treats them all as "remote call failed" with the best
/// available message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine rejected the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command does not apply to the simulation's current run state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The simulation identity is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflicting resource already exists (e.g. a snapshot name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The engine could not be reached or returned an unexpected status.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("malformed engine response: {0}")]
    Decode(String),
}

impl EngineError {
    /// Taxonomy tag for this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Network(_) | Self::Decode(_) => ErrorKind::Network,
        }
    }

    /// The raw message without the taxonomy prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::InvalidState(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Network(msg)
            | Self::Decode(msg) => msg,
        }
    }

    /// Whether the failure happened below the application layer.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Decode(_))
    }
}

/// The operations a remote simulation engine exposes.
///
/// All calls are asynchronous; issuing one suspends only the calling
/// command handler. Implementations must return whole snapshots.
pub trait SimulationEngine {
    /// Create a new simulation and return its first snapshot.
    fn create_simulation(
        &self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Fetch the canonical snapshot of a simulation.
    fn get_simulation(
        &self,
        id: &SimulationId,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Start continuous generation advance.
    fn start_simulation(
        &self,
        id: &SimulationId,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Stop continuous generation advance.
    fn stop_simulation(
        &self,
        id: &SimulationId,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Advance exactly one generation.
    fn step_simulation(
        &self,
        id: &SimulationId,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Reset the simulation to generation zero.
    fn reset_simulation(
        &self,
        id: &SimulationId,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// Change the engine-side speed multiplier.
    fn update_simulation_speed(
        &self,
        id: &SimulationId,
        speed: SpeedMultiplier,
    ) -> impl Future<Output = Result<Snapshot, EngineError>>;

    /// List the simulations the engine knows about.
    fn list_simulations(&self) -> impl Future<Output = Result<Vec<SnapshotSummary>, EngineError>>;

    /// Store a named snapshot of the simulation's current state.
    fn save_simulation_snapshot(
        &self,
        id: &SimulationId,
        name: &str,
        description: Option<&str>,
    ) -> impl Future<Output = Result<SaveReceipt, EngineError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_share_the_network_tag() {
        assert_eq!(EngineError::Decode(String::new()).kind(), ErrorKind::Network);
        assert!(EngineError::Network("down".to_owned()).is_transport());
        assert!(!EngineError::Conflict("taken".to_owned()).is_transport());
    }

    #[test]
    fn message_strips_the_prefix() {
        let err = EngineError::InvalidState("already running".to_owned());
        assert_eq!(err.message(), "already running");
        assert_eq!(err.to_string(), "invalid state: already running");
    }
}
