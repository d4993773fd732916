//! Batch step planning.
//!
//! One "step" command may turn into several engine step calls. Speeds
//! `1..=9` are a plain rate: that many generations per command. The top
//! speed is a different mode altogether: advance until the target
//! generation is reached.

use petri_types::SpeedMultiplier;

/// Target generation assumed when none is persisted.
pub const DEFAULT_TARGET_GENERATION: u64 = 1;

/// How a step command advances the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// A fixed number of generations per command.
    Rate(u8),
    /// Advance up to the target generation.
    ToTarget,
}

impl From<SpeedMultiplier> for StepMode {
    fn from(speed: SpeedMultiplier) -> Self {
        if speed.is_max() {
            Self::ToTarget
        } else {
            Self::Rate(speed.get())
        }
    }
}

/// The planned batch for one step command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    /// Mode derived from the speed.
    pub mode: StepMode,
    /// Number of sequential engine step calls to issue.
    pub steps: u64,
}

/// Plan the number of engine step calls for one step command.
///
/// In [`StepMode::ToTarget`] a missing target defaults to
/// [`DEFAULT_TARGET_GENERATION`] and a missing current generation to zero.
/// The result is never negative: a simulation already past its target plans
/// zero steps.
pub fn plan_steps(
    speed: SpeedMultiplier,
    target_generation: Option<u64>,
    current_generation: Option<u64>,
) -> StepPlan {
    let mode = StepMode::from(speed);
    let steps = match mode {
        StepMode::Rate(rate) => u64::from(rate),
        StepMode::ToTarget => target_generation
            .unwrap_or(DEFAULT_TARGET_GENERATION)
            .saturating_sub(current_generation.unwrap_or(0)),
    };
    StepPlan { mode, steps }
}
