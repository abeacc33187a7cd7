//! PPO agent: action selection and the clipped update
//!
//! The agent owns the policy, its optimizer and the trajectory buffer.
//! Parameters only change inside [`PPOAgent::learn`], which drains the
//! buffer before returning.

use anyhow::{Context, Result, bail};
use rand::{SeedableRng, rngs::StdRng};
use tch::{Device, Kind, Tensor, nn};

use super::{config::PPOConfig, loss::*, stats::TrainingStats};
use crate::{
    buffer::{TrajectoryBuffer, Transition, compute_advantages, minibatch_schedule},
    env::{ACTION_DIM, Action, Observation},
    policy::beta_cnn::BetaCnnPolicy,
};

/// Result of [`PPOAgent::select_action`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSample {
    /// Sampled action in `[0, 1]^3`
    pub action: Action,

    /// Log-probability of `action`, summed over components
    pub log_prob: f32,

    /// Value estimate of the observation
    pub value: f32,
}

/// PPO agent with a Beta-policy actor-critic
pub struct PPOAgent {
    config: PPOConfig,
    policy: BetaCnnPolicy,
    optimizer: nn::Optimizer,
    buffer: TrajectoryBuffer,
    rng: StdRng,
    device: Device,
}

impl PPOAgent {
    /// Create an agent around `policy`
    ///
    /// Validates the configuration, builds an Adam optimizer over the
    /// policy's parameters and seeds the random sources when
    /// `config.seed` is set.
    pub fn new(config: PPOConfig, policy: BetaCnnPolicy) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => {
                tch::manual_seed(seed as i64);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };
        let optimizer = policy.optimizer(config.learning_rate)?;
        let device = policy.device();

        Ok(Self { config, policy, optimizer, buffer: TrajectoryBuffer::new(), rng, device })
    }

    /// Sample an action for a single observation without tracking gradients
    pub fn select_action(&self, observation: &Observation) -> Result<ActionSample> {
        let input = observation_tensor(std::slice::from_ref(observation))?.to_device(self.device);

        let (action, log_prob, value) = tch::no_grad(|| {
            let output = self.policy.forward(&input);
            let dist = output.distribution();
            let action = dist.sample();
            let log_prob = dist.log_prob(&action).sum_dim_intlist(-1, false, Kind::Float);
            (action, log_prob, output.value)
        });

        let components: Vec<f32> = Vec::try_from(action.view([-1]).to_device(Device::Cpu))?;
        Ok(ActionSample {
            action: Action::try_from(components.as_slice())?,
            log_prob: f64::try_from(&log_prob)? as f32,
            value: f64::try_from(&value)? as f32,
        })
    }

    /// Store a transition for the next learning phase
    pub fn remember(&mut self, transition: Transition) {
        self.buffer.memory(transition);
    }

    /// Run the PPO update over everything buffered, then clear the buffer
    ///
    /// For each of `n_epochs` epochs the minibatch schedule is drawn from
    /// the buffer's index partition; every minibatch gets one combined
    /// actor + critic backward pass and one optimizer step.
    pub fn learn(&mut self) -> Result<TrainingStats> {
        if self.buffer.is_empty() {
            bail!("learn called on an empty trajectory buffer");
        }

        let batch = self.buffer.generate_batch(self.config.batch_size);
        let n = batch.len();
        let device = self.device;

        let states = observation_tensor(batch.states)?.to_device(device);
        let actions = Tensor::from_slice(&batch.flat_actions())
            .view([n as i64, ACTION_DIM as i64])
            .to_device(device);
        let old_log_probs = Tensor::from_slice(batch.log_probs).to_device(device);

        let (advantages, returns) = compute_advantages(
            batch.rewards,
            batch.values,
            self.config.gamma as f32,
            self.config.gae_lambda as f32,
        );
        let advantages = Tensor::from_slice(&advantages).to_device(device);
        let returns = Tensor::from_slice(&returns).to_device(device);

        let mut stats = TrainingStats::zeros();

        for _ in 0..self.config.n_epochs {
            let schedule = minibatch_schedule(
                &batch.batches,
                n,
                self.config.minibatch_sampling,
                &mut self.rng,
            );

            for indices in &schedule {
                let indices: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
                let index = Tensor::from_slice(&indices).to_device(device);

                let mb_states = states.index_select(0, &index);
                let mb_actions = actions.index_select(0, &index);
                let mb_old_log_probs = old_log_probs.index_select(0, &index);
                let mb_advantages = advantages.index_select(0, &index);
                let mb_returns = returns.index_select(0, &index);

                let output = self.policy.forward(&mb_states);
                let dist = output.distribution();
                let log_probs = dist.log_prob(&mb_actions).sum_dim_intlist(-1, false, Kind::Float);
                let entropy = dist.entropy().sum_dim_intlist(-1, false, Kind::Float);

                let (policy_loss, clip_fraction, approx_kl) = compute_policy_loss(
                    &log_probs,
                    &mb_old_log_probs,
                    &mb_advantages,
                    self.config.clip_range,
                );
                let value_loss = compute_value_loss(&output.value.squeeze_dim(-1), &mb_returns);
                let entropy_loss = compute_entropy_loss(&entropy);

                let loss = &policy_loss
                    + self.config.vf_coef * &value_loss
                    + self.config.ent_coef * &entropy_loss;

                self.optimizer.zero_grad();
                loss.backward();
                if let Some(max_norm) = self.config.max_grad_norm {
                    self.optimizer.clip_grad_norm(max_norm);
                }
                self.optimizer.step();

                stats += &TrainingStats::new(
                    f64::try_from(&policy_loss)?,
                    f64::try_from(&value_loss)?,
                    f64::try_from(entropy.mean(Kind::Float))?,
                    f64::try_from(&loss)?,
                    clip_fraction,
                    approx_kl,
                );
            }
        }

        self.buffer.clear();

        let stats = stats.average();
        if !stats.total_loss.is_finite() {
            bail!("non-finite loss after update: {}", stats);
        }
        Ok(stats)
    }

    /// Save the policy to its checkpoint file
    pub fn save_model(&self) -> Result<()> {
        tracing::info!("... save model ...");
        self.policy.save_ckpt()
    }

    /// Load the policy from its checkpoint file
    pub fn load_model(&mut self) -> Result<()> {
        tracing::info!("... load model ...");
        self.policy.load_ckpt()
    }

    /// Number of buffered transitions
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// The policy network
    pub fn policy(&self) -> &BetaCnnPolicy {
        &self.policy
    }

    /// The configuration
    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    /// Device holding the policy
    pub fn device(&self) -> Device {
        self.device
    }
}

/// Stack observations into a `[n, channels, height, width]` CPU tensor
fn observation_tensor(observations: &[Observation]) -> Result<Tensor> {
    let first = observations.first().context("no observations to stack")?;
    let [c, h, w] = first.shape();

    let mut flat = Vec::with_capacity(first.len() * observations.len());
    for obs in observations {
        if obs.shape() != first.shape() {
            bail!("observation shape {:?} differs from {:?}", obs.shape(), first.shape());
        }
        flat.extend_from_slice(obs.data());
    }

    Ok(Tensor::from_slice(&flat).view([observations.len() as i64, c as i64, h as i64, w as i64]))
}
