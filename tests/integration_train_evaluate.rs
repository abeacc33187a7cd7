//! End-to-end: train on the track simulator, reload the checkpoint,
//! evaluate and persist the scores

use racing_ppo::prelude::*;
use tch::Device;

fn env(seed: u64) -> RacingEnv<TrackSim> {
    // 30 no-op steps leave 30 simulator steps, about 8 agent steps per episode
    let sim = TrackSim::new(TrackConfig::new().seed(seed).max_steps(60)).unwrap();
    RacingEnv::new(sim, EnvConfig::default()).unwrap()
}

fn agent(save_dir: &str) -> PPOAgent {
    let policy = BetaCnnPolicy::new(
        BetaCnnConfig { hidden_dim: 32, ..Default::default() },
        Device::Cpu,
        save_dir,
    );
    PPOAgent::new(PPOConfig::new().batch_size(4).n_epochs(2).seed(1), policy).unwrap()
}

#[test]
fn test_train_then_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let save_dir = dir.path().join("ppo_model");
    let save_dir = save_dir.to_str().unwrap();

    // Train
    let config = RunConfig::train().n_episodes(3).update_step(5).save_dir(save_dir);
    let mut train_env = env(3);
    let mut trainer = agent(save_dir);

    let summaries = racing_ppo::train::train(&mut train_env, &mut trainer, &config).unwrap();

    assert_eq!(summaries.len(), 3);
    for (i, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.episode, i);
        assert!(summary.episode_steps > 0);
        assert!(summary.reward.is_finite());
    }
    let last = summaries.last().unwrap();
    assert_eq!(last.total_steps, summaries.iter().map(|s| s.episode_steps).sum::<usize>());
    assert_eq!(last.learn_steps, last.total_steps / 5);
    assert!(last.learn_steps >= 1);
    assert!(trainer.buffer_len() < 5);

    // The first episode is always a new best, so a checkpoint exists
    let ckpt = dir.path().join("ppo_model.safetensors");
    assert!(ckpt.exists());

    // Evaluate a reloaded agent
    let mut evaluator = agent(save_dir);
    evaluator.load_model().unwrap();

    let config = RunConfig::test().n_episodes(2).save_dir(save_dir);
    let mut test_env = env(4);
    let report = racing_ppo::train::evaluate(&mut test_env, &evaluator, &config).unwrap();

    assert_eq!(report.scores.len(), 2);
    assert_eq!(evaluator.buffer_len(), 0);

    let results = dir.path().join("scores.json");
    report.save_report(&results).unwrap();
    assert_eq!(EvaluationReport::load_report(&results).unwrap(), report);
}

#[test]
fn test_load_without_checkpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let save_dir = dir.path().join("missing");
    let mut agent = agent(save_dir.to_str().unwrap());
    assert!(agent.load_model().is_err());
}

#[test]
fn test_wrapper_over_track_sim() {
    let mut env = env(8);
    let obs = env.reset().unwrap();
    assert_eq!(obs.shape(), [3, 84, 84]);
    assert!(obs.data().iter().all(|&v| (0.0..=1.0).contains(&v)));

    let step = env.step(&Action::ZERO).unwrap();
    assert!(!step.done);
    assert_eq!(env.reward_window().len(), 100);
    assert_eq!(step.observation.shape(), [3, 84, 84]);
}
