//! # Racing PPO
//!
//! Proximal Policy Optimization with a Beta-distribution policy for
//! top-down car racing, on top of PyTorch (via tch-rs).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use racing_ppo::prelude::*;
//! use tch::Device;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RunConfig::train().n_episodes(100);
//! let sim = TrackSim::new(TrackConfig::new())?;
//! let mut env = RacingEnv::new(sim, EnvConfig::default())?;
//!
//! let policy = BetaCnnPolicy::new(BetaCnnConfig::default(), Device::Cpu, &config.save_dir);
//! let mut agent = PPOAgent::new(PPOConfig::default(), policy)?;
//!
//! train(&mut env, &mut agent, &config)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Simulator interface, frame preprocessing and the action-repeat wrapper
pub mod env;

/// Beta distribution and the convolutional actor-critic
pub mod policy;

/// Trajectory storage, GAE and minibatch scheduling
pub mod buffer;

/// PPO agent and episode drivers
pub mod train;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::buffer::{MinibatchSampling, TrajectoryBuffer, Transition};
    pub use crate::env::{
        Action, EnvConfig, Frame, Observation, RacingEnv, Simulator, StepResult, TrackConfig,
        TrackSim,
    };
    pub use crate::policy::{Beta, BetaCnnConfig, BetaCnnPolicy, PolicyOutput};
    pub use crate::train::{
        EvaluationReport, PPOAgent, PPOConfig, RunConfig, TrainingStats, evaluate, train,
    };
}

/// Current version of racing-ppo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
