//! Episode loops for training and evaluation
//!
//! Training acts with the current policy, stores every transition, runs a
//! learning phase every `update_step` agent steps and checkpoints whenever
//! the moving-average score reaches a new best. Evaluation only acts.

use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::ppo::PPOAgent;
use crate::{
    buffer::Transition,
    env::{RacingEnv, Simulator},
};

/// Episode-loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Episodes to run
    pub n_episodes: usize,

    /// Agent steps between learning phases
    pub update_step: usize,

    /// Episodes in the moving-average score
    pub score_window: usize,

    /// Checkpoint name; the file is `<save_dir>.safetensors`
    pub save_dir: String,

    /// Where evaluation scores are written
    pub results_file: PathBuf,

    /// Directory for rendered frames, `None` disables rendering
    pub render_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::train()
    }
}

impl RunConfig {
    /// Long training run
    pub fn train() -> Self {
        Self {
            n_episodes: 30_000,
            update_step: 500,
            score_window: 10,
            save_dir: "./ppo_model".to_string(),
            results_file: PathBuf::from("ppo_car_racing_scores.json"),
            render_dir: None,
        }
    }

    /// Short evaluation run with rendering
    pub fn test() -> Self {
        Self { n_episodes: 10, render_dir: Some(PathBuf::from("./renders")), ..Self::train() }
    }

    /// Set episode count
    pub fn n_episodes(mut self, n: usize) -> Self {
        self.n_episodes = n;
        self
    }

    /// Set learning cadence
    pub fn update_step(mut self, steps: usize) -> Self {
        self.update_step = steps;
        self
    }

    /// Set moving-average window
    pub fn score_window(mut self, episodes: usize) -> Self {
        self.score_window = episodes;
        self
    }

    /// Set checkpoint name
    pub fn save_dir(mut self, dir: impl Into<String>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Set results file
    pub fn results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = path.into();
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.update_step == 0 {
            bail!("update_step must be positive");
        }
        if self.score_window == 0 {
            bail!("score_window must be positive");
        }
        if self.save_dir.is_empty() {
            bail!("save_dir must not be empty");
        }
        Ok(())
    }
}

/// Mean of the most recent episode scores
#[derive(Debug, Clone)]
pub struct ScoreWindow {
    capacity: usize,
    scores: VecDeque<f32>,
}

impl ScoreWindow {
    /// Window over the last `capacity` scores
    pub fn new(capacity: usize) -> Self {
        Self { capacity, scores: VecDeque::with_capacity(capacity) }
    }

    /// Record a score and return the updated mean
    pub fn push(&mut self, score: f32) -> f32 {
        if self.scores.len() == self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
        self.mean()
    }

    /// Mean of the held scores, `0` when empty
    pub fn mean(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    /// Number of held scores
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether no score has been recorded
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Bookkeeping for one finished episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Zero-based episode index
    pub episode: usize,

    /// Agent steps in this episode
    pub episode_steps: usize,

    /// Agent steps since the run started
    pub total_steps: usize,

    /// Learning phases since the run started
    pub learn_steps: usize,

    /// Sum of rewards over the episode
    pub reward: f32,

    /// Moving-average score including this episode
    pub avg_reward: f32,
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Episode: {:04}, episode steps: {:04}, total steps: {:07}, learn steps: {:04}, episode reward: {:.6}, avg reward: {:.6}",
            self.episode,
            self.episode_steps,
            self.total_steps,
            self.learn_steps,
            self.reward,
            self.avg_reward
        )
    }
}

/// Scores from an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Total reward per episode
    pub scores: Vec<f32>,

    /// Mean score
    pub mean: f64,

    /// Population standard deviation of the scores
    pub std: f64,
}

impl EvaluationReport {
    /// Summarize per-episode scores
    pub fn from_scores(scores: Vec<f32>) -> Self {
        if scores.is_empty() {
            return Self { scores, mean: 0.0, std: 0.0 };
        }
        let n = scores.len() as f64;
        let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = scores.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
        Self { scores, mean, std: variance.sqrt() }
    }

    /// Write the report as pretty-printed JSON
    pub fn save_report<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing results {}", path.display()))
    }

    /// Read a report written by [`save_report`](Self::save_report)
    pub fn load_report<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading results {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Train `agent` on `env` for `config.n_episodes` episodes
///
/// The buffer stores the sampled `[0, 1]^3` action; the simulator receives
/// its rescaled control. A learning phase may fire mid-episode.
pub fn train<S: Simulator>(
    env: &mut RacingEnv<S>,
    agent: &mut PPOAgent,
    config: &RunConfig,
) -> Result<Vec<EpisodeSummary>> {
    config.validate()?;

    let mut summaries = Vec::with_capacity(config.n_episodes);
    let mut window = ScoreWindow::new(config.score_window);
    let mut best_score = f32::NEG_INFINITY;
    let mut total_steps = 0;
    let mut learn_steps = 0;

    for episode in 0..config.n_episodes {
        let mut episode_steps = 0;
        let mut total_reward = 0.0;
        let mut state = env.reset()?;

        loop {
            let sample = agent.select_action(&state)?;
            let step = env.step(&sample.action.to_control())?;

            total_steps += 1;
            episode_steps += 1;
            total_reward += step.reward;

            let done = step.done;
            agent.remember(Transition {
                state,
                action: sample.action,
                log_prob: sample.log_prob,
                reward: step.reward,
                next_state: step.observation.clone(),
                value: sample.value,
            });

            if total_steps % config.update_step == 0 {
                tracing::info!("...updating...");
                let stats = agent.learn()?;
                learn_steps += 1;
                tracing::debug!("update {}: {}", learn_steps, stats);
            }

            if done {
                if step.aborted {
                    tracing::debug!("episode {} aborted on poor reward", episode);
                }
                break;
            }
            state = step.observation;
        }

        let avg_reward = window.push(total_reward);
        if avg_reward > best_score {
            agent.save_model()?;
            best_score = avg_reward;
        }

        let summary = EpisodeSummary {
            episode,
            episode_steps,
            total_steps,
            learn_steps,
            reward: total_reward,
            avg_reward,
        };
        tracing::info!("{}", summary);
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Run `config.n_episodes` episodes without learning and summarize the scores
pub fn evaluate<S: Simulator>(
    env: &mut RacingEnv<S>,
    agent: &PPOAgent,
    config: &RunConfig,
) -> Result<EvaluationReport> {
    config.validate()?;

    let mut scores = Vec::with_capacity(config.n_episodes);
    let mut window = ScoreWindow::new(config.score_window);
    let mut total_steps = 0;

    for episode in 0..config.n_episodes {
        let mut episode_steps = 0;
        let mut total_reward = 0.0;
        let mut state = env.reset()?;

        loop {
            let sample = agent.select_action(&state)?;
            let step = env.step(&sample.action.to_control())?;

            total_steps += 1;
            episode_steps += 1;
            total_reward += step.reward;

            if step.done {
                break;
            }
            state = step.observation;
        }

        let summary = EpisodeSummary {
            episode,
            episode_steps,
            total_steps,
            learn_steps: 0,
            reward: total_reward,
            avg_reward: window.push(total_reward),
        };
        tracing::info!("{}", summary);
        scores.push(total_reward);
    }

    let report = EvaluationReport::from_scores(scores);
    tracing::info!("scores mean: {:.3}, score std: {:.3}", report.mean, report.std);
    Ok(report)
}
