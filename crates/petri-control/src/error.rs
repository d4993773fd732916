//! Error taxonomy for the run controller.
//!
//! Every failure carries one [`ErrorKind`] tag and one human-readable
//! message. The pair is what the dashboard shows as the current error.

use petri_types::InvalidSpeed;
use serde::Serialize;

use crate::engine::EngineError;
use crate::prefs::PreferenceError;

/// Taxonomy tag shown alongside an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Bad input, rejected locally or by the engine.
    Validation,
    /// The command does not apply in the current run state.
    InvalidState,
    /// The engine does not know the simulation.
    NotFound,
    /// The engine refused because of a conflicting resource.
    Conflict,
    /// The engine could not be reached or answered garbage.
    Network,
    /// Another mutating command is still in flight.
    Busy,
    /// No simulation is loaded.
    NoActiveSimulation,
    /// The local preference store failed.
    Storage,
}

/// Errors returned by [`RunController`](crate::controller::RunController)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A remote engine call failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reading or writing preferences failed.
    #[error("preference store error: {0}")]
    Preferences(#[from] PreferenceError),

    /// A mutating command for this simulation is already in flight.
    #[error("another command is still running for this simulation")]
    Busy,

    /// The command needs a loaded simulation.
    #[error("no simulation available")]
    NoActiveSimulation,

    /// The command does not apply in the current run state.
    #[error("{0}")]
    InvalidState(String),

    /// The requested speed multiplier is out of range.
    #[error(transparent)]
    InvalidSpeed(#[from] InvalidSpeed),

    /// A run-creation request failed local validation.
    #[error("invalid run request: {0}")]
    Validation(String),
}

impl ControlError {
    /// Taxonomy tag for this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Engine(err) => err.kind(),
            Self::Preferences(_) => ErrorKind::Storage,
            Self::Busy => ErrorKind::Busy,
            Self::NoActiveSimulation => ErrorKind::NoActiveSimulation,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidSpeed(_) | Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Whether the condition was detected locally without reaching the
    /// engine.
    pub const fn is_local_guard(&self) -> bool {
        matches!(self, Self::Busy | Self::NoActiveSimulation)
    }

    /// Best available human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::Engine(err) => err.message().to_owned(),
            other => other.to_string(),
        }
    }
}

/// The error record exposed at the render boundary.
///
/// It stays in place until explicitly dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfacedError {
    /// Taxonomy tag.
    pub kind: ErrorKind,
    /// Message for the user.
    pub message: String,
}

impl From<&ControlError> for SurfacedError {
    fn from(err: &ControlError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message(),
        }
    }
}

impl core::fmt::Display for SurfacedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_keep_their_tag_and_raw_message() {
        let err =
            ControlError::from(EngineError::NotFound("simulation sim-1 not found".to_owned()));
        let surfaced = SurfacedError::from(&err);
        assert_eq!(surfaced.kind, ErrorKind::NotFound);
        assert_eq!(surfaced.message, "simulation sim-1 not found");
    }

    #[test]
    fn speed_errors_are_validation() {
        let err = ControlError::from(InvalidSpeed(11));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("11"));
    }

    #[test]
    fn guards_are_local() {
        assert!(ControlError::Busy.is_local_guard());
        assert!(ControlError::NoActiveSimulation.is_local_guard());
        assert!(!ControlError::InvalidState(String::new()).is_local_guard());
    }
}
