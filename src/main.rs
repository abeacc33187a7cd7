//! Train or evaluate a PPO agent on the built-in track simulator
//!
//! # Usage
//!
//! ```bash
//! racing-ppo          # train, checkpointing to ./ppo_model.safetensors
//! racing-ppo --test   # load the checkpoint, run 10 rendered episodes
//! ```
//!
//! Logging defaults to `info`; override with `RUST_LOG`.

use anyhow::Result;
use clap::Parser;
use racing_ppo::prelude::*;
use tch::Device;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "racing-ppo", about = "PPO with a Beta policy for top-down car racing")]
struct Cli {
    /// Evaluate a saved model instead of training
    #[arg(short, long, default_value_t = false)]
    test: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let device = Device::cuda_if_available();

    if cli.test {
        tracing::info!("... start testing ...");
        let config = RunConfig::test();

        let mut sim_config = TrackConfig::new();
        if let Some(dir) = &config.render_dir {
            sim_config = sim_config.render_dir(dir);
        }
        let mut env = RacingEnv::new(TrackSim::new(sim_config)?, EnvConfig::default())?;

        let policy = BetaCnnPolicy::new(BetaCnnConfig::default(), device, &config.save_dir);
        let mut agent = PPOAgent::new(PPOConfig::default(), policy)?;
        agent.load_model()?;

        let report = evaluate(&mut env, &agent, &config)?;
        report.save_report(&config.results_file)?;
        tracing::info!("scores written to {}", config.results_file.display());
    } else {
        tracing::info!("... start training ...");
        let config = RunConfig::train();

        let sim = TrackSim::new(TrackConfig::new())?;
        let mut env = RacingEnv::new(sim, EnvConfig::default())?;

        let policy = BetaCnnPolicy::new(BetaCnnConfig::default(), device, &config.save_dir);
        tracing::info!("device: {:?}, parameters: {}", device, policy.num_parameters());
        let mut agent = PPOAgent::new(PPOConfig::default(), policy)?;

        let summaries = train(&mut env, &mut agent, &config)?;
        if let Some(last) = summaries.last() {
            tracing::info!(
                "finished after {} steps, final avg reward {:.3}",
                last.total_steps,
                last.avg_reward
            );
        }
    }

    Ok(())
}
