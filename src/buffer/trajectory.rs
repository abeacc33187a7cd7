//! Trajectory buffer for storing and processing transitions
//!
//! This module implements experience storage for PPO training, including:
//! - Transition storage (states, actions, log-probabilities, rewards, values)
//! - GAE (Generalized Advantage Estimation) computation
//! - Index partitions and per-epoch minibatch schedules
//!
//! # Buffer Layout
//!
//! A single environment feeds the buffer, so every field is a flat sequence
//! indexed by step. The whole buffer is treated as one continuous trajectory
//! when advantages are computed.

mod gae;
mod sampling;
mod storage;


pub use gae::compute_advantages;
pub use sampling::{MinibatchSampling, minibatch_schedule, partition_indices};
pub use storage::{TrajectoryBatch, TrajectoryBuffer, Transition};
