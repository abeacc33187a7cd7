//! Beta distribution over `[0, 1]` actions
//!
//! One independent Beta per action dimension, parameterized by
//! concentration tensors `alpha` and `beta` of identical shape.
//!
//! ```text
//! log p(x) = (α - 1) ln x + (β - 1) ln(1 - x) - ln B(α, β)
//! ln B(α, β) = lnΓ(α) + lnΓ(β) - lnΓ(α + β)
//! ```

use tch::Tensor;

/// Values are clamped this far inside `(0, 1)` before taking logs
const EPS: f64 = 1e-6;

/// Element-wise Beta distribution
#[derive(Debug)]
pub struct Beta {
    alpha: Tensor,
    beta: Tensor,
}

impl Beta {
    /// Build a distribution from concentration parameters
    pub fn new(alpha: Tensor, beta: Tensor) -> Self {
        debug_assert_eq!(alpha.size(), beta.size(), "alpha/beta shape mismatch");
        Self { alpha, beta }
    }

    /// Draw one sample per element
    ///
    /// Uses the Gamma ratio `X / (X + Y)` with `X ~ Γ(α)`, `Y ~ Γ(β)`. Not
    /// differentiable.
    pub fn sample(&self) -> Tensor {
        tch::no_grad(|| {
            let x = self.alpha.internal_standard_gamma();
            let y = self.beta.internal_standard_gamma();
            &x / (&x + &y)
        })
    }

    /// Element-wise log density of `value`
    pub fn log_prob(&self, value: &Tensor) -> Tensor {
        let x = value.clamp(EPS, 1.0 - EPS);
        let one_minus_x = x.ones_like() - &x;
        (&self.alpha - 1.0) * x.log() + (&self.beta - 1.0) * one_minus_x.log() - self.log_norm()
    }

    /// Element-wise differential entropy
    pub fn entropy(&self) -> Tensor {
        let total = &self.alpha + &self.beta;
        self.log_norm() - (&self.alpha - 1.0) * self.alpha.digamma()
            - (&self.beta - 1.0) * self.beta.digamma()
            + (&total - 2.0) * total.digamma()
    }

    /// Element-wise mean `α / (α + β)`
    pub fn mean(&self) -> Tensor {
        &self.alpha / (&self.alpha + &self.beta)
    }

    fn log_norm(&self) -> Tensor {
        self.alpha.lgamma() + self.beta.lgamma() - (&self.alpha + &self.beta).lgamma()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn full(value: f64, n: i64) -> Tensor {
        Tensor::full([n], value, (Kind::Float, Device::Cpu))
    }

    fn scalar(t: Tensor) -> f64 {
        f64::try_from(t.sum(Kind::Float)).unwrap()
    }

    #[test]
    fn test_uniform_log_prob_is_zero() {
        let dist = Beta::new(full(1.0, 3), full(1.0, 3));
        let x = Tensor::from_slice(&[0.1_f32, 0.5, 0.9]);
        let lp: Vec<f32> = Vec::try_from(dist.log_prob(&x)).unwrap();
        assert!(lp.iter().all(|v| v.abs() < 1e-5));
    }

    #[test]
    fn test_log_prob_closed_form() {
        // Beta(2, 2) at 0.5: 6 * 0.25 = 1.5
        let dist = Beta::new(full(2.0, 1), full(2.0, 1));
        let lp = scalar(dist.log_prob(&full(0.5, 1)));
        assert!((lp - 1.5_f64.ln()).abs() < 1e-4);

        // Beta(2, 5) at 0.3: 30 * 0.3 * 0.7^4
        let dist = Beta::new(full(2.0, 1), full(5.0, 1));
        let lp = scalar(dist.log_prob(&full(0.3, 1)));
        let expected = (30.0 * 0.3 * 0.7_f64.powi(4)).ln();
        assert!((lp - expected).abs() < 1e-4);
    }

    #[test]
    fn test_log_prob_at_boundary_is_finite() {
        let dist = Beta::new(full(3.0, 2), full(1.5, 2));
        let x = Tensor::from_slice(&[0.0_f32, 1.0]);
        let lp: Vec<f32> = Vec::try_from(dist.log_prob(&x)).unwrap();
        assert!(lp.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_entropy() {
        // Uniform on [0, 1] has zero differential entropy
        let dist = Beta::new(full(1.0, 1), full(1.0, 1));
        assert!(scalar(dist.entropy()).abs() < 1e-5);

        // Beta(2, 2) has entropy ln(1/6) - 2ψ(2) + 2ψ(4) ≈ -0.1251
        let dist = Beta::new(full(2.0, 1), full(2.0, 1));
        assert!((scalar(dist.entropy()) + 0.125_f64).abs() < 1e-3);
    }

    #[test]
    fn test_samples_in_unit_interval() {
        tch::manual_seed(0);
        let dist = Beta::new(full(2.0, 4000), full(6.0, 4000));
        let samples = dist.sample();
        let values: Vec<f32> = Vec::try_from(&samples).unwrap();

        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert!((mean - 0.25).abs() < 0.02, "sample mean {}", mean);
        assert!(!samples.requires_grad());
    }

    #[test]
    fn test_mean() {
        let dist = Beta::new(full(1.0, 1), full(3.0, 1));
        assert!((scalar(dist.mean()) - 0.25).abs() < 1e-6);
    }
}
