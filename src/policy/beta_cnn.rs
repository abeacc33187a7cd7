//! Convolutional actor-critic with a Beta action head
//!
//! # Architecture
//!
//! ```text
//! Input [batch, 3, 84, 84]
//!         |
//!   Conv(32, 8x8, /4) - ReLU
//!   Conv(64, 4x4, /2) - ReLU
//!   Conv(64, 3x3, /1) - ReLU
//!         |
//!      Flatten (3136)
//!       /        \
//!  [Dense(512)]  [Dense(512)]
//!     ReLU         ReLU
//!  [Dense(1)]     /     \
//!     |      [Dense(n)] [Dense(n)]
//!   Value    Softplus+1 Softplus+1
//!               |          |
//!             alpha       beta
//! ```
//!
//! Both concentrations are at least 1, so every per-dimension Beta is
//! unimodal on `[0, 1]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tch::{
    Device, Tensor,
    nn::{self, Init, Module, OptimizerConfig},
};

use super::beta::Beta;

/// Bias value for convolution layers
const CONV_BIAS_INIT: f64 = 0.1;

/// Architecture configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaCnnConfig {
    /// Observation channels
    pub in_channels: i64,

    /// Square observation side length
    pub input_size: i64,

    /// Continuous action dimensions
    pub action_dim: i64,

    /// Width of the dense layers
    pub hidden_dim: i64,
}

impl Default for BetaCnnConfig {
    fn default() -> Self {
        Self { in_channels: 3, input_size: 84, action_dim: 3, hidden_dim: 512 }
    }
}

impl BetaCnnConfig {
    /// Flattened feature size after the convolution stack
    pub fn feature_dim(&self) -> i64 {
        let out = |size: i64, kernel: i64, stride: i64| (size - kernel) / stride + 1;
        let side = out(out(out(self.input_size, 8, 4), 4, 2), 3, 1);
        64 * side * side
    }
}

/// Network outputs for a batch of observations
#[derive(Debug)]
pub struct PolicyOutput {
    /// First Beta concentration `[batch, action_dim]`, each `>= 1`
    pub alpha: Tensor,

    /// Second Beta concentration `[batch, action_dim]`, each `>= 1`
    pub beta: Tensor,

    /// State value estimate `[batch, 1]`
    pub value: Tensor,
}

impl PolicyOutput {
    /// Action distribution described by these outputs
    pub fn distribution(&self) -> Beta {
        Beta::new(self.alpha.shallow_clone(), self.beta.shallow_clone())
    }
}

/// Xavier-uniform initialization with ReLU gain for a conv layer
fn xavier_relu(in_channels: i64, out_channels: i64, kernel: i64) -> Init {
    let gain = 2.0_f64.sqrt();
    let fan_in = (in_channels * kernel * kernel) as f64;
    let fan_out = (out_channels * kernel * kernel) as f64;
    let bound = gain * (6.0 / (fan_in + fan_out)).sqrt();
    Init::Uniform { lo: -bound, up: bound }
}

fn conv(
    path: nn::Path,
    in_channels: i64,
    out_channels: i64,
    kernel: i64,
    stride: i64,
) -> nn::Conv2D {
    let config = nn::ConvConfig {
        stride,
        ws_init: xavier_relu(in_channels, out_channels, kernel),
        bs_init: Init::Const(CONV_BIAS_INIT),
        ..Default::default()
    };
    nn::conv2d(path, in_channels, out_channels, kernel, config)
}

/// Beta-policy actor-critic over pixel observations
///
/// Owns its variable store; the optimizer is built from it with
/// [`BetaCnnPolicy::optimizer`].
pub struct BetaCnnPolicy {
    vs: nn::VarStore,
    cnn_base: nn::Sequential,
    value_head: nn::Sequential,
    fc: nn::Linear,
    alpha_head: nn::Linear,
    beta_head: nn::Linear,
    device: Device,
    config: BetaCnnConfig,
    ckpt_file: PathBuf,
}

impl BetaCnnPolicy {
    /// Create a policy on `device` checkpointing to `<save_dir>.safetensors`
    pub fn new(config: BetaCnnConfig, device: Device, save_dir: &str) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let cnn = &root / "cnn_base";

        let cnn_base = nn::seq()
            .add(conv(&cnn / "conv1", config.in_channels, 32, 8, 4))
            .add_fn(|x| x.relu())
            .add(conv(&cnn / "conv2", 32, 64, 4, 2))
            .add_fn(|x| x.relu())
            .add(conv(&cnn / "conv3", 64, 64, 3, 1))
            .add_fn(|x| x.relu())
            .add_fn(|x| x.flatten(1, -1));

        let features = config.feature_dim();
        let hidden = config.hidden_dim;

        let value_head = nn::seq()
            .add(nn::linear(&root / "v" / "fc1", features, hidden, Default::default()))
            .add_fn(|x| x.relu())
            .add(nn::linear(&root / "v" / "fc2", hidden, 1, Default::default()));

        let fc = nn::linear(&root / "fc", features, hidden, Default::default());
        let alpha_head =
            nn::linear(&root / "alpha_head", hidden, config.action_dim, Default::default());
        let beta_head =
            nn::linear(&root / "beta_head", hidden, config.action_dim, Default::default());

        Self {
            vs,
            cnn_base,
            value_head,
            fc,
            alpha_head,
            beta_head,
            device,
            config,
            ckpt_file: checkpoint_path(save_dir),
        }
    }

    /// Forward pass over `[batch, channels, height, width]` observations
    pub fn forward(&self, obs: &Tensor) -> PolicyOutput {
        let features = self.cnn_base.forward(obs);
        let value = self.value_head.forward(&features);
        let hidden = features.apply(&self.fc).relu();
        let alpha = hidden.apply(&self.alpha_head).softplus() + 1.0;
        let beta = hidden.apply(&self.beta_head).softplus() + 1.0;
        PolicyOutput { alpha, beta, value }
    }

    /// Create an Adam optimizer over all parameters
    pub fn optimizer(&self, learning_rate: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.vs, learning_rate)?)
    }

    /// Write all parameters to the checkpoint file
    pub fn save_ckpt(&self) -> Result<()> {
        self.save_to(&self.ckpt_file)
    }

    /// Load all parameters from the checkpoint file onto this policy's device
    ///
    /// Fails if the file is missing or its tensors do not match this
    /// architecture.
    pub fn load_ckpt(&mut self) -> Result<()> {
        let path = self.ckpt_file.clone();
        self.load_from(path)
    }

    /// Save parameters to an explicit path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.vs.save(path).with_context(|| format!("saving checkpoint {}", path.display()))
    }

    /// Load parameters from an explicit path
    pub fn load_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.vs.load(path).with_context(|| format!("loading checkpoint {}", path.display()))
    }

    /// Checkpoint file used by [`save_ckpt`](Self::save_ckpt)
    pub fn ckpt_file(&self) -> &Path {
        &self.ckpt_file
    }

    /// Device holding the parameters
    pub fn device(&self) -> Device {
        self.device
    }

    /// Architecture configuration
    pub fn config(&self) -> &BetaCnnConfig {
        &self.config
    }

    /// Reference to the variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.vs.trainable_variables().iter().map(|t| t.numel()).sum()
    }
}

/// Checkpoint path for a save-directory name
pub fn checkpoint_path(save_dir: &str) -> PathBuf {
    PathBuf::from(format!("{save_dir}.safetensors"))
}
