//! Train the racing policy with PPO
//!
//! Runs the full training driver against the scripted simulator. Pass a JSON
//! config file to override any default; missing fields keep their defaults.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_racing --release
//! cargo run --example train_racing --release -- train.json
//! RUST_LOG=debug cargo run --example train_racing --release
//! ```

use anyhow::Result;
use thrust_racing::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting CarRacing PPO training");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading config from {}", path);
            TrainConfig::from_json_file(path)?
        }
        None => TrainConfig::default(),
    };

    tracing::info!("Environment:");
    tracing::info!("  Action repeat: {}", config.env.action_repeat);
    tracing::info!("  Frame stack: {}", config.env.img_stack);
    tracing::info!("  Solve threshold: {}", config.env.reward_threshold);
    tracing::info!("PPO:");
    tracing::info!("  Buffer capacity: {}", config.ppo.buffer_capacity);
    tracing::info!("  Minibatch size: {}", config.ppo.batch_size);
    tracing::info!("  Epochs: {}", config.ppo.n_epochs);
    tracing::info!("  Seed: {}", config.seed);

    let simulator = ScriptedSimulator::new(ScriptedConfig::default());
    let mut driver = TrainingDriver::new(config, simulator)?;
    let summary = driver.run()?;

    tracing::info!("Training complete!");
    tracing::info!("  Episodes: {}", summary.episodes());
    tracing::info!("  Updates: {}", summary.updates);
    tracing::info!("  Running score: {:.2}", summary.running_score);
    tracing::info!("  Solved: {}", summary.solved);
    if let Some(stats) = &summary.last_stats {
        tracing::info!(
            "  Last update | PL: {:.3} | VL: {:.3} | KL: {:.4} | Clip: {:.3}",
            stats.policy_loss,
            stats.value_loss,
            stats.approx_kl,
            stats.clip_fraction
        );
    }

    Ok(())
}
