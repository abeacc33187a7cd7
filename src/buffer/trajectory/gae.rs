//! Generalized Advantage Estimation (GAE) computation

/// Compute GAE advantages and target returns for one continuous trajectory
///
/// # Arguments
/// * `rewards` - Reward per step
/// * `values` - Value estimate per step
/// * `gamma` - Discount factor (0 < gamma <= 1)
/// * `gae_lambda` - GAE lambda parameter (0 <= lambda <= 1)
///
/// # Mathematical Formula
/// ```text
/// δ_t = r_t + γ * V_{t+1} - V_t
/// A_t = δ_t + γ * λ * A_{t+1}        for t < n - 1
/// A_{n-1} = 0
/// R_t = A_t + V_t
/// ```
///
/// The final step has no successor value to bootstrap from, so its
/// advantage is zero and its return equals its value. No episode-boundary
/// masking is applied.
///
/// # Returns
/// `(advantages, returns)`, both of length `n`
pub fn compute_advantages(
    rewards: &[f32],
    values: &[f32],
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n, "rewards/values length mismatch");

    let mut advantages = vec![0.0_f32; n];
    let mut gae = 0.0_f32;

    for t in (0..n.saturating_sub(1)).rev() {
        let delta = rewards[t] + gamma * values[t + 1] - values[t];
        gae = delta + gamma * gae_lambda * gae;
        advantages[t] = gae;
    }

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}
