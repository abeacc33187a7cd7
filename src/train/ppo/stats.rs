//! Training statistics for PPO
//!
//! Per-minibatch metrics are summed during a learning phase and averaged at
//! the end.

use std::{fmt, ops::AddAssign};

/// Training statistics for a PPO update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingStats {
    /// Policy loss
    pub policy_loss: f64,

    /// Value function loss
    pub value_loss: f64,

    /// Mean policy entropy
    pub entropy: f64,

    /// Total loss (weighted sum of policy, value, and entropy losses)
    pub total_loss: f64,

    /// Fraction of clipped policy updates
    pub clip_fraction: f64,

    /// Approximate KL divergence between old and new policies
    pub approx_kl: f64,

    /// Number of gradient updates performed
    pub num_updates: usize,
}

impl TrainingStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Statistics for a single optimizer step
    pub fn new(
        policy_loss: f64,
        value_loss: f64,
        entropy: f64,
        total_loss: f64,
        clip_fraction: f64,
        approx_kl: f64,
    ) -> Self {
        Self {
            policy_loss,
            value_loss,
            entropy,
            total_loss,
            clip_fraction,
            approx_kl,
            num_updates: 1,
        }
    }

    /// Add another statistics instance to this one
    pub fn add(&mut self, other: &TrainingStats) {
        self.policy_loss += other.policy_loss;
        self.value_loss += other.value_loss;
        self.entropy += other.entropy;
        self.total_loss += other.total_loss;
        self.clip_fraction += other.clip_fraction;
        self.approx_kl += other.approx_kl;
        self.num_updates += other.num_updates;
    }

    /// Per-update averages; `num_updates` keeps the summed count
    pub fn average(&self) -> Self {
        let scale = self.num_updates as f64;
        if scale == 0.0 {
            return Self::zeros();
        }

        Self {
            policy_loss: self.policy_loss / scale,
            value_loss: self.value_loss / scale,
            entropy: self.entropy / scale,
            total_loss: self.total_loss / scale,
            clip_fraction: self.clip_fraction / scale,
            approx_kl: self.approx_kl / scale,
            num_updates: self.num_updates,
        }
    }
}

impl AddAssign<&TrainingStats> for TrainingStats {
    fn add_assign(&mut self, other: &TrainingStats) {
        self.add(other);
    }
}

impl fmt::Display for TrainingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "policy_loss={:.4} value_loss={:.4} entropy={:.4} clip_frac={:.3} approx_kl={:.5} updates={}",
            self.policy_loss,
            self.value_loss,
            self.entropy,
            self.clip_fraction,
            self.approx_kl,
            self.num_updates
        )
    }
}
