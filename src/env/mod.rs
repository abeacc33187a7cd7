//! Environment traits and implementations
//!
//! This module defines the simulator interface the agent drives, the
//! observation/action records that flow between simulator, wrapper and
//! agent, and the built-in top-down track simulator.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod frame;
pub mod track;
pub mod wrapper;

pub use frame::{Frame, Observation, preprocess};
pub use track::{TrackConfig, TrackSim};
pub use wrapper::{EnvConfig, EnvStep, RacingEnv, RewardWindow};

/// Number of continuous action components (steering, gas, brake)
pub const ACTION_DIM: usize = 3;

/// Core trait for the raw racing simulator
///
/// The simulator renders RGB frames and accepts one continuous control per
/// step. Frame-skip, cropping and early termination are layered on top by
/// [`RacingEnv`].
pub trait Simulator {
    /// Reset the simulator and return the first rendered frame
    fn reset(&mut self) -> Result<Frame>;

    /// Advance the simulator by one step with the given control
    fn step(&mut self, action: &Action) -> Result<StepResult<Frame>>;
}

/// Result of a simulator step
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,
}

impl<O> StepResult<O> {
    /// Whether the episode ended for either reason
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A three-component continuous action: `[steering, gas, brake]`
///
/// Actions sampled from the policy live in `[0, 1]` per component. The
/// simulator expects steering in `[-1, 1]`; use [`Action::to_control`] to map
/// between the two.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action(pub [f32; ACTION_DIM]);

impl Action {
    /// The no-op control
    pub const ZERO: Action = Action([0.0; ACTION_DIM]);

    /// Build an action from its components
    pub fn new(steering: f32, gas: f32, brake: f32) -> Self {
        Self([steering, gas, brake])
    }

    /// Steering component
    pub fn steering(&self) -> f32 {
        self.0[0]
    }

    /// Gas component
    pub fn gas(&self) -> f32 {
        self.0[1]
    }

    /// Brake component
    pub fn brake(&self) -> f32 {
        self.0[2]
    }

    /// Components as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Map a `[0, 1]^3` policy sample into simulator ranges
    ///
    /// Steering becomes `2a - 1`; gas and brake are passed through.
    pub fn to_control(&self) -> Action {
        Action([2.0 * (self.0[0] - 0.5), self.0[1], self.0[2]])
    }
}

impl From<[f32; ACTION_DIM]> for Action {
    fn from(values: [f32; ACTION_DIM]) -> Self {
        Self(values)
    }
}

impl TryFrom<&[f32]> for Action {
    type Error = anyhow::Error;

    fn try_from(values: &[f32]) -> Result<Self> {
        let values: [f32; ACTION_DIM] = values.try_into().map_err(|_| {
            anyhow::anyhow!("expected {} action components, got {}", ACTION_DIM, values.len())
        })?;
        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_control_maps_steering() {
        let action = Action::new(0.0, 0.3, 0.7).to_control();
        assert_eq!(action, Action::new(-1.0, 0.3, 0.7));

        let action = Action::new(1.0, 1.0, 0.0).to_control();
        assert_eq!(action, Action::new(1.0, 1.0, 0.0));

        let action = Action::new(0.5, 0.0, 0.0).to_control();
        assert_eq!(action.steering(), 0.0);
    }

    #[test]
    fn test_action_from_slice() {
        let action = Action::try_from(&[0.1_f32, 0.2, 0.3][..]).unwrap();
        assert_eq!(action.gas(), 0.2);
        assert!(Action::try_from(&[0.1_f32, 0.2][..]).is_err());
    }
}
