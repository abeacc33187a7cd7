//! Policy and neural network wrappers
//!
//! This module provides the Beta action distribution and the
//! convolutional actor-critic built on tch-rs.

pub mod beta;
pub mod beta_cnn;

pub use beta::Beta;
pub use beta_cnn::{BetaCnnConfig, BetaCnnPolicy, PolicyOutput};
