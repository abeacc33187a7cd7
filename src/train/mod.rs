//! Training algorithms and episode drivers
//!
//! [`ppo`] holds the learning algorithm; [`driver`] runs it against an
//! environment.

pub mod driver;
pub mod ppo;

pub use driver::{EpisodeSummary, EvaluationReport, RunConfig, ScoreWindow, evaluate, train};
pub use ppo::{
    ActionSample, PPOAgent, PPOConfig, TrainingStats, compute_entropy_loss, compute_policy_loss,
    compute_value_loss,
};
