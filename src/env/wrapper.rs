//! Frame-skipping environment wrapper
//!
//! [`RacingEnv`] hides three details of the raw simulator from the agent:
//!
//! - the start-of-episode zoom animation (skipped with no-op steps),
//! - action repeat (one agent decision drives `action_stack` simulator steps),
//! - the crop/normalize preprocessing of frames.
//!
//! It also aborts episodes early when the mean of the last 100 per-step
//! rewards drops to the poor-performance threshold, which cuts off runs where
//! the car is stuck on the grass.

use std::collections::VecDeque;
use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::frame::{CROP_COLS, CROP_ROWS, Observation, preprocess};
use super::{Action, Simulator};

/// Wrapper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Simulator steps per agent decision
    pub action_stack: usize,

    /// No-op steps executed after every reset
    pub noop_steps: usize,

    /// Length of the rolling reward window
    pub reward_window: usize,

    /// Episode ends once the window mean is at or below this value
    pub poor_reward_threshold: f32,

    /// Frame rows kept by preprocessing
    pub crop_rows: Range<usize>,

    /// Frame columns kept by preprocessing
    pub crop_cols: Range<usize>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            action_stack: 4,
            noop_steps: 30,
            reward_window: 100,
            poor_reward_threshold: -0.1,
            crop_rows: CROP_ROWS,
            crop_cols: CROP_COLS,
        }
    }
}

impl EnvConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of repeated simulator steps per action
    pub fn action_stack(mut self, steps: usize) -> Self {
        self.action_stack = steps;
        self
    }

    /// Set the number of no-op steps after reset
    pub fn noop_steps(mut self, steps: usize) -> Self {
        self.noop_steps = steps;
        self
    }

    /// Set the rolling reward window length
    pub fn reward_window(mut self, len: usize) -> Self {
        self.reward_window = len;
        self
    }

    /// Set the early-termination threshold
    pub fn poor_reward_threshold(mut self, threshold: f32) -> Self {
        self.poor_reward_threshold = threshold;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.action_stack == 0 {
            bail!("action_stack must be positive");
        }
        if self.reward_window == 0 {
            bail!("reward_window must be positive");
        }
        if self.crop_rows.is_empty() || self.crop_cols.is_empty() {
            bail!("crop window must be non-empty");
        }
        Ok(())
    }
}

/// Fixed-length FIFO of the most recent per-step rewards
#[derive(Debug, Clone)]
pub struct RewardWindow {
    rewards: VecDeque<f32>,
    capacity: usize,
}

impl RewardWindow {
    /// Create a window of `capacity` zeros
    pub fn new(capacity: usize) -> Self {
        Self { rewards: std::iter::repeat_n(0.0, capacity).collect(), capacity }
    }

    /// Refill the window with zeros
    pub fn reset(&mut self) {
        self.rewards.iter_mut().for_each(|r| *r = 0.0);
    }

    /// Drop the oldest reward and append `reward`
    ///
    /// # Panics
    ///
    /// If the window length drifts from its capacity. That is a wrapper bug,
    /// not a recoverable condition.
    pub fn push(&mut self, reward: f32) {
        self.rewards.pop_front();
        self.rewards.push_back(reward);
        assert_eq!(
            self.rewards.len(),
            self.capacity,
            "reward window length {} != {}",
            self.rewards.len(),
            self.capacity
        );
    }

    /// Mean of the rewards in the window
    pub fn mean(&self) -> f32 {
        let sum: f64 = self.rewards.iter().map(|&r| r as f64).sum();
        (sum / self.capacity as f64) as f32
    }

    /// Current number of entries (always the capacity)
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Whether the window holds no entries
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Iterate rewards from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.rewards.iter()
    }
}

/// Outcome of one agent-level step
#[derive(Debug, Clone)]
pub struct EnvStep {
    /// Preprocessed observation after the last executed simulator step
    pub observation: Observation,

    /// Reward accumulated over the executed simulator steps
    pub reward: f32,

    /// Whether the episode is over
    pub done: bool,

    /// Whether `done` came from the poor-reward heuristic
    pub aborted: bool,
}

/// Action-repeat wrapper around a [`Simulator`]
#[derive(Debug)]
pub struct RacingEnv<S> {
    simulator: S,
    config: EnvConfig,
    reward_window: RewardWindow,
}

impl<S: Simulator> RacingEnv<S> {
    /// Wrap a simulator
    pub fn new(simulator: S, config: EnvConfig) -> Result<Self> {
        config.validate()?;
        let reward_window = RewardWindow::new(config.reward_window);
        Ok(Self { simulator, config, reward_window })
    }

    /// Start a new episode
    ///
    /// Resets the simulator, skips the zoom-in animation with no-op steps and
    /// zeroes the reward window.
    pub fn reset(&mut self) -> Result<Observation> {
        let mut frame = self.simulator.reset()?;
        for _ in 0..self.config.noop_steps {
            frame = self.simulator.step(&Action::ZERO)?.observation;
        }
        self.reward_window.reset();
        preprocess(&frame, self.config.crop_rows.clone(), self.config.crop_cols.clone())
    }

    /// Repeat `action` for up to `action_stack` simulator steps
    ///
    /// Stops early when the simulator ends the episode or the rolling reward
    /// mean falls to the poor-performance threshold.
    pub fn step(&mut self, action: &Action) -> Result<EnvStep> {
        let mut total_reward = 0.0;
        let mut done = false;
        let mut aborted = false;
        let mut frame = None;

        for _ in 0..self.config.action_stack {
            let result = self.simulator.step(action)?;
            total_reward += result.reward;
            self.reward_window.push(result.reward);

            let poor = self.reward_window.mean() <= self.config.poor_reward_threshold;
            let ended = result.is_done();
            frame = Some(result.observation);

            if ended || poor {
                done = true;
                aborted = poor && !ended;
                break;
            }
        }

        let frame = frame.ok_or_else(|| anyhow::anyhow!("no simulator step was executed"))?;
        let observation =
            preprocess(&frame, self.config.crop_rows.clone(), self.config.crop_cols.clone())?;

        Ok(EnvStep { observation, reward: total_reward, done, aborted })
    }

    /// The rolling reward window
    pub fn reward_window(&self) -> &RewardWindow {
        &self.reward_window
    }

    /// The wrapper configuration
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// The wrapped simulator
    pub fn simulator(&self) -> &S {
        &self.simulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Frame, StepResult};

    /// Simulator replaying a fixed reward script
    struct ScriptedSim {
        rewards: Vec<f32>,
        end_at: Option<usize>,
        steps: usize,
        actions: Vec<Action>,
    }

    impl ScriptedSim {
        fn new(rewards: Vec<f32>) -> Self {
            Self { rewards, end_at: None, steps: 0, actions: Vec::new() }
        }
    }

    impl Simulator for ScriptedSim {
        fn reset(&mut self) -> Result<Frame> {
            self.steps = 0;
            self.actions.clear();
            Ok(Frame::filled(96, 96, [100, 200, 50]))
        }

        fn step(&mut self, action: &Action) -> Result<StepResult<Frame>> {
            let reward = self.rewards[self.steps % self.rewards.len()];
            self.steps += 1;
            self.actions.push(*action);
            Ok(StepResult {
                observation: Frame::filled(96, 96, [self.steps as u8, 0, 255]),
                reward,
                terminated: self.end_at == Some(self.steps),
                truncated: false,
            })
        }
    }

    fn env_with(rewards: Vec<f32>, config: EnvConfig) -> RacingEnv<ScriptedSim> {
        RacingEnv::new(ScriptedSim::new(rewards), config).unwrap()
    }

    #[test]
    fn test_reward_window_fifo() {
        let mut window = RewardWindow::new(3);
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean(), 0.0);

        window.push(3.0);
        window.push(6.0);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![0.0, 3.0, 6.0]);
        assert_eq!(window.len(), 3);

        window.push(9.0);
        window.push(12.0);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![6.0, 9.0, 12.0]);
        assert!((window.mean() - 9.0).abs() < 1e-6);

        window.reset();
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_reset_skips_zoom_and_clears_window() {
        let mut env = env_with(vec![-1.0], EnvConfig::default());
        let obs = env.reset().unwrap();

        assert_eq!(env.simulator().steps, 30);
        assert!(env.simulator().actions.iter().all(|a| *a == Action::ZERO));
        assert_eq!(env.reward_window().len(), 100);
        assert_eq!(env.reward_window().mean(), 0.0);
        assert_eq!(obs.shape(), [3, 84, 84]);
    }

    #[test]
    fn test_zero_action_accumulates_four_substeps() {
        let mut env = env_with(vec![0.5, 1.0, 1.5, 2.0], EnvConfig::default().noop_steps(0));
        env.reset().unwrap();

        let step = env.step(&Action::ZERO).unwrap();

        assert!(!step.done);
        assert!(!step.aborted);
        assert!((step.reward - 5.0).abs() < 1e-6);
        assert_eq!(env.simulator().steps, 4);
        assert_eq!(step.observation.shape(), [3, 84, 84]);
        // Observation comes from the last substep frame
        assert_eq!(step.observation.data()[0], 4.0 / 255.0);
    }

    #[test]
    fn test_window_length_invariant_across_steps() {
        let mut env = env_with(vec![0.3, -0.05, 0.1], EnvConfig::default().noop_steps(0));
        env.reset().unwrap();
        for _ in 0..60 {
            env.step(&Action::new(0.1, 0.5, 0.0)).unwrap();
            assert_eq!(env.reward_window().len(), 100);
        }
    }

    #[test]
    fn test_early_abort_on_poor_rewards() {
        let mut env = env_with(vec![-0.1], EnvConfig::default().noop_steps(0));
        env.reset().unwrap();

        let mut steps = 0;
        let last = loop {
            let step = env.step(&Action::ZERO).unwrap();
            steps += 1;
            if step.done {
                break step;
            }
        };

        // Mean hits -0.1 once the window holds 100 rewards of -0.1
        assert_eq!(env.simulator().steps, 100);
        assert_eq!(steps, 25);
        assert!(last.aborted);
        assert!((env.reward_window().mean() + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_simulator_termination_stops_repeat() {
        let mut sim = ScriptedSim::new(vec![1.0]);
        sim.end_at = Some(2);
        let mut env = RacingEnv::new(sim, EnvConfig::default().noop_steps(0)).unwrap();
        env.reset().unwrap();

        let step = env.step(&Action::ZERO).unwrap();

        assert!(step.done);
        assert!(!step.aborted);
        assert_eq!(env.simulator().steps, 2);
        assert!((step.reward - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_forwards_action() {
        let mut env = env_with(vec![1.0], EnvConfig::default().noop_steps(0));
        env.reset().unwrap();
        let action = Action::new(-0.5, 0.25, 0.0);
        env.step(&action).unwrap();
        assert!(env.simulator().actions.iter().all(|a| *a == action));
    }

    #[test]
    fn test_config_validation() {
        assert!(EnvConfig::default().validate().is_ok());
        assert!(EnvConfig::default().action_stack(0).validate().is_err());
        assert!(EnvConfig::default().reward_window(0).validate().is_err());
    }
}
