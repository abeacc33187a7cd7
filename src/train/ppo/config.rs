//! PPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for PPO training
//! and provides validation and builder pattern methods.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::buffer::MinibatchSampling;

/// PPO configuration parameters
///
/// Defaults match the car-racing setup: eight epochs over minibatches of
/// 128, tight clipping, and an unweighted sum of actor and critic losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PPOConfig {
    /// Adam learning rate
    pub learning_rate: f64,

    /// Number of training epochs per learning phase
    pub n_epochs: usize,

    /// Minibatch size for training
    pub batch_size: usize,

    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub gae_lambda: f64,

    /// PPO clipping parameter (epsilon)
    pub clip_range: f64,

    /// Value function loss coefficient
    pub vf_coef: f64,

    /// Entropy bonus coefficient
    pub ent_coef: f64,

    /// Maximum gradient norm, `None` disables clipping
    pub max_grad_norm: Option<f64>,

    /// How minibatches are drawn within an epoch
    pub minibatch_sampling: MinibatchSampling,

    /// Seed for minibatch scheduling and libtorch sampling
    pub seed: Option<u64>,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_epochs: 8,
            batch_size: 128,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.1,
            vf_coef: 1.0,
            ent_coef: 0.0,
            max_grad_norm: None,
            minibatch_sampling: MinibatchSampling::default(),
            seed: None,
        }
    }
}

impl PPOConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            bail!("learning_rate must be positive");
        }
        if self.n_epochs == 0 {
            bail!("n_epochs must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            bail!("gamma must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            bail!("gae_lambda must be in [0, 1]");
        }
        if self.clip_range <= 0.0 || self.clip_range >= 1.0 {
            bail!("clip_range must be in (0, 1)");
        }
        if self.vf_coef < 0.0 {
            bail!("vf_coef must be non-negative");
        }
        if self.ent_coef < 0.0 {
            bail!("ent_coef must be non-negative");
        }
        if let Some(norm) = self.max_grad_norm
            && norm <= 0.0
        {
            bail!("max_grad_norm must be positive");
        }
        Ok(())
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set number of training epochs
    pub fn n_epochs(mut self, epochs: usize) -> Self {
        self.n_epochs = epochs;
        self
    }

    /// Set minibatch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn gae_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    /// Set PPO clipping parameter
    pub fn clip_range(mut self, clip: f64) -> Self {
        self.clip_range = clip;
        self
    }

    /// Set value function loss coefficient
    pub fn vf_coef(mut self, coef: f64) -> Self {
        self.vf_coef = coef;
        self
    }

    /// Set entropy bonus coefficient
    pub fn ent_coef(mut self, coef: f64) -> Self {
        self.ent_coef = coef;
        self
    }

    /// Enable gradient norm clipping
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = Some(norm);
        self
    }

    /// Set minibatch sampling mode
    pub fn minibatch_sampling(mut self, sampling: MinibatchSampling) -> Self {
        self.minibatch_sampling = sampling;
        self
    }

    /// Fix the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PPOConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_epochs, 8);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.clip_range, 0.1);
        assert_eq!(config.gamma, 0.99);
        assert_eq!(config.gae_lambda, 0.95);
        assert_eq!(config.max_grad_norm, None);
        assert_eq!(config.minibatch_sampling, MinibatchSampling::ShuffledEpoch);
    }

    #[test]
    fn test_config_validation() {
        assert!(PPOConfig::new().validate().is_ok());

        assert!(PPOConfig::new().learning_rate(-1.0).validate().is_err());
        assert!(PPOConfig::new().gamma(1.5).validate().is_err());
        assert!(PPOConfig::new().gae_lambda(-0.1).validate().is_err());
        assert!(PPOConfig::new().n_epochs(0).validate().is_err());
        assert!(PPOConfig::new().batch_size(0).validate().is_err());
        assert!(PPOConfig::new().clip_range(0.0).validate().is_err());
        assert!(PPOConfig::new().clip_range(1.0).validate().is_err());
        assert!(PPOConfig::new().vf_coef(-0.1).validate().is_err());
        assert!(PPOConfig::new().max_grad_norm(0.0).validate().is_err());

        // Zero coefficients are allowed
        assert!(PPOConfig::new().vf_coef(0.0).ent_coef(0.0).validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PPOConfig::new()
            .learning_rate(1e-3)
            .n_epochs(4)
            .batch_size(32)
            .max_grad_norm(0.5)
            .minibatch_sampling(MinibatchSampling::WithReplacement)
            .seed(42);

        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.n_epochs, 4);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_grad_norm, Some(0.5));
        assert_eq!(config.minibatch_sampling, MinibatchSampling::WithReplacement);
        assert_eq!(config.seed, Some(42));

        // Other values should remain default
        assert_eq!(config.gae_lambda, 0.95);
        assert_eq!(config.vf_coef, 1.0);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config =
            PPOConfig::new().seed(3).minibatch_sampling(MinibatchSampling::WithReplacement);
        let json = serde_json::to_string(&config).unwrap();
        let restored: PPOConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
