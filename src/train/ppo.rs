//! Proximal Policy Optimization (PPO) with a Beta policy
//!
//! # Algorithm Overview
//!
//! ```text
//! Repeat:
//!   1. Act in the environment, buffering transitions
//!   2. Every `update_step` steps:
//!      a. Compute advantages over the buffer using GAE
//!      b. For `n_epochs` epochs, for each scheduled minibatch:
//!         - recompute Beta log-probabilities of the buffered actions
//!         - clipped surrogate loss + value MSE, one combined backward pass
//!         - one Adam step
//!      c. Clear the buffer
//! ```
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)
//! - [Beta policy for continuous control](https://proceedings.mlr.press/v70/chou17a.html)

mod agent;
mod config;
mod loss;
mod stats;

pub use agent::{ActionSample, PPOAgent};
pub use config::PPOConfig;
pub use loss::{compute_entropy_loss, compute_policy_loss, compute_value_loss};
pub use stats::TrainingStats;
