//! Enumeration and bounded scalar types.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Whether the remote engine is advancing a simulation on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum RunState {
    /// Stopped; generations only advance through explicit steps.
    #[default]
    Idle,
    /// The engine is advancing generations continuously.
    Running,
}

impl RunState {
    /// Map the engine's `isRunning` flag onto a run state.
    pub const fn from_running(running: bool) -> Self {
        if running { Self::Running } else { Self::Idle }
    }

    /// Whether this is [`RunState::Running`].
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A speed multiplier outside the accepted `1..=10` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSpeed(pub i64);

impl core::fmt::Display for InvalidSpeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "speed multiplier must be between {} and {}, got {}",
            SpeedMultiplier::MIN.get(),
            SpeedMultiplier::MAX.get(),
            self.0
        )
    }
}

impl std::error::Error for InvalidSpeed {}

/// Generations advanced per step command, validated to `1..=10`.
///
/// The top value doubles as "run to the target generation"; the planner
/// in `petri-control` turns that into a distinct step mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpeedMultiplier(u8);

impl SpeedMultiplier {
    /// Slowest speed: one generation per step.
    pub const MIN: Self = Self(1);

    /// Highest speed, interpreted as "run to target".
    pub const MAX: Self = Self(10);

    /// Validate a raw multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSpeed`] when `raw` is outside `1..=10`.
    pub fn new(raw: i64) -> Result<Self, InvalidSpeed> {
        u8::try_from(raw)
            .ok()
            .filter(|v| (Self::MIN.0..=Self::MAX.0).contains(v))
            .map(Self)
            .ok_or(InvalidSpeed(raw))
    }

    /// The raw multiplier value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the top, run-to-target value.
    pub const fn is_max(self) -> bool {
        self.0 == Self::MAX.0
    }
}

impl Default for SpeedMultiplier {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<i64> for SpeedMultiplier {
    type Error = InvalidSpeed;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<SpeedMultiplier> for u8 {
    fn from(speed: SpeedMultiplier) -> Self {
        speed.0
    }
}

impl core::fmt::Display for SpeedMultiplier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl<'de> Deserialize<'de> for SpeedMultiplier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn speed_bounds() {
        assert!(SpeedMultiplier::new(0).is_err());
        assert!(SpeedMultiplier::new(11).is_err());
        assert!(SpeedMultiplier::new(-3).is_err());
        assert_eq!(SpeedMultiplier::new(1), Ok(SpeedMultiplier::MIN));
        assert_eq!(SpeedMultiplier::new(10), Ok(SpeedMultiplier::MAX));
    }

    #[test]
    fn speed_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<SpeedMultiplier>("11").is_err());
        assert!(serde_json::from_str::<SpeedMultiplier>("4").is_ok());
    }

    #[test]
    fn run_state_wire_names() {
        let json = serde_json::to_string(&RunState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(RunState::from_running(false), RunState::Idle);
    }
}
