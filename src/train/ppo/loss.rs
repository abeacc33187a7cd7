//! Loss computation functions for PPO
//!
//! This module contains the core loss computation functions used
//! in PPO training: clipped policy loss, value loss and entropy loss.

use tch::{Kind, Tensor};

/// Compute PPO policy loss with clipping
///
/// Returns (policy_loss, clip_fraction, approx_kl)
///
/// Advantages are used as given; no per-minibatch normalization is applied.
///
/// # Arguments
/// * `log_probs` - Log probabilities of actions under current policy
/// * `old_log_probs` - Log probabilities of actions under old policy
/// * `advantages` - Computed advantages
/// * `clip_range` - PPO clipping parameter (epsilon)
pub fn compute_policy_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    clip_range: f64,
) -> (Tensor, f64, f64) {
    let ratio = (log_probs - old_log_probs).exp();

    let clipped_ratio = ratio.clamp(1.0 - clip_range, 1.0 + clip_range);
    let surr1 = advantages * &ratio;
    let surr2 = advantages * clipped_ratio;
    let policy_loss = -surr1.minimum(&surr2).mean(Kind::Float);

    let (clip_fraction, approx_kl) = tch::no_grad(|| {
        let clip_fraction =
            (&ratio - 1.0).abs().gt(clip_range).to_kind(Kind::Float).mean(Kind::Float);
        let approx_kl = (old_log_probs - log_probs).mean(Kind::Float);
        (clip_fraction, approx_kl)
    });

    (
        policy_loss,
        f64::try_from(&clip_fraction).unwrap_or(0.0),
        f64::try_from(&approx_kl).unwrap_or(0.0),
    )
}

/// Compute the critic's mean squared error against target returns
///
/// # Arguments
/// * `values` - Predicted values under current value function
/// * `returns` - Computed returns (targets)
pub fn compute_value_loss(values: &Tensor, returns: &Tensor) -> Tensor {
    (values - returns).square().mean(Kind::Float)
}

/// Compute entropy loss (negative entropy for maximization)
///
/// # Arguments
/// * `entropy` - Entropy tensor from policy distribution
pub fn compute_entropy_loss(entropy: &Tensor) -> Tensor {
    -entropy.mean(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn full(value: f64, n: i64) -> Tensor {
        Tensor::full([n], value, (Kind::Float, Device::Cpu))
    }

    /// Gradient of the policy loss with respect to the new log-probabilities
    fn policy_grad(ratio: f64, advantage: f64, clip_range: f64) -> (f64, f64) {
        let log_probs = full(ratio.ln(), 1).set_requires_grad(true);
        let old_log_probs = full(0.0, 1);
        let advantages = full(advantage, 1);

        let (loss, _, _) = compute_policy_loss(&log_probs, &old_log_probs, &advantages, clip_range);
        loss.backward();

        let grad = f64::try_from(log_probs.grad().sum(Kind::Float)).unwrap();
        (f64::try_from(&loss).unwrap(), grad)
    }

    #[test]
    fn test_unit_ratio_loss() {
        let log_probs = full(-1.2, 4);
        let advantages = Tensor::from_slice(&[1.0_f32, -2.0, 3.0, 0.5]);

        let (loss, clip_fraction, approx_kl) =
            compute_policy_loss(&log_probs, &log_probs, &advantages, 0.1);

        // ratio == 1 so the loss is minus the mean advantage
        assert!((f64::try_from(&loss).unwrap() + 0.625).abs() < 1e-6);
        assert_eq!(clip_fraction, 0.0);
        assert!(approx_kl.abs() < 1e-7);
    }

    #[test]
    fn test_inside_clip_range_matches_unclipped() {
        // d(-ratio * A)/d(log ratio) = -ratio * A
        let (loss, grad) = policy_grad(1.05, 2.0, 0.1);
        assert!((loss + 2.1).abs() < 1e-5);
        assert!((grad + 2.1).abs() < 1e-5);

        let (_, grad) = policy_grad(0.95, -1.0, 0.1);
        assert!((grad - 0.95).abs() < 1e-5);
    }

    #[test]
    fn test_clipped_regime_has_no_gradient() {
        // Positive advantage with ratio above 1 + eps: clipped term dominates
        let (loss, grad) = policy_grad(1.5, 2.0, 0.1);
        assert!((loss + 2.2).abs() < 1e-5);
        assert_eq!(grad, 0.0);

        // Negative advantage with ratio below 1 - eps
        let (loss, grad) = policy_grad(0.5, -1.0, 0.1);
        assert!((loss - 0.9).abs() < 1e-5);
        assert_eq!(grad, 0.0);
    }

    #[test]
    fn test_clipped_loss_insensitive_to_further_increase() {
        let (loss_a, _) = policy_grad(1.3, 1.0, 0.1);
        let (loss_b, _) = policy_grad(3.0, 1.0, 0.1);
        assert!((loss_a - loss_b).abs() < 1e-6);
    }

    #[test]
    fn test_pessimistic_side_stays_unclipped() {
        // Negative advantage with a large ratio is not clipped
        let (loss, grad) = policy_grad(1.5, -1.0, 0.1);
        assert!((loss - 1.5).abs() < 1e-5);
        assert!((grad - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_clip_fraction() {
        let old = full(0.0, 4);
        let new = Tensor::from_slice(&[0.0_f32, 0.5, -0.5, 0.01]);
        let advantages = full(1.0, 4);

        let (_, clip_fraction, _) = compute_policy_loss(&new, &old, &advantages, 0.1);
        assert!((clip_fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_value_loss_is_mse() {
        let values = Tensor::from_slice(&[1.0_f32, 2.0, 3.0]);
        let returns = Tensor::from_slice(&[1.0_f32, 0.0, 6.0]);

        let loss = compute_value_loss(&values, &returns);
        assert!((f64::try_from(&loss).unwrap() - 13.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_entropy_loss() {
        let entropy = Tensor::from_slice(&[0.5_f32, 1.5]);
        assert!((f64::try_from(compute_entropy_loss(&entropy)).unwrap() + 1.0).abs() < 1e-6);
    }
}
