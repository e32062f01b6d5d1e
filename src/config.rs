//! Process configuration
//!
//! Everything the training driver needs is supplied through [`TrainConfig`]
//! before training starts and is never mutated afterwards. Configs can be
//! persisted as JSON so a run can be reproduced exactly.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::train::PPOConfig;

/// Environment adapter parameters
///
/// Defaults mirror the CarRacing reward-shaping setup: a +100 bonus cancels
/// the simulator's terminal penalty, and standing on grass costs 0.05 per
/// tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of simulator ticks each chosen action is applied for
    pub action_repeat: usize,

    /// Number of grayscale frames stacked into one observation
    pub img_stack: usize,

    /// Reward added on every tick the simulator reports a terminal state
    pub die_bonus: f64,

    /// Reward added on every tick the mean green channel exceeds the threshold
    pub green_penalty: f64,

    /// Mean green-channel intensity (0..255) above which the car is on grass
    pub green_threshold: f64,

    /// Length of the rolling reward history
    pub reward_memory_len: usize,

    /// Rolling mean reward at or below which the episode is stopped
    pub stagnation_threshold: f64,

    /// Running score above which the task counts as solved
    pub reward_threshold: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            action_repeat: 8,
            img_stack: 4,
            die_bonus: 100.0,
            green_penalty: -0.05,
            green_threshold: 185.0,
            reward_memory_len: 100,
            stagnation_threshold: -0.1,
            reward_threshold: 900.0,
        }
    }
}

impl EnvConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.action_repeat == 0 {
            return Err(anyhow!("action_repeat must be positive"));
        }
        if self.img_stack == 0 {
            return Err(anyhow!("img_stack must be positive"));
        }
        if self.reward_memory_len == 0 {
            return Err(anyhow!("reward_memory_len must be positive"));
        }
        if !(0.0..=255.0).contains(&self.green_threshold) {
            return Err(anyhow!("green_threshold must be in [0, 255]"));
        }
        Ok(())
    }

    /// Set action repeat
    pub fn action_repeat(mut self, repeat: usize) -> Self {
        self.action_repeat = repeat;
        self
    }

    /// Set frame stack depth
    pub fn img_stack(mut self, depth: usize) -> Self {
        self.img_stack = depth;
        self
    }

    /// Set the terminal-state bonus
    pub fn die_bonus(mut self, bonus: f64) -> Self {
        self.die_bonus = bonus;
        self
    }

    /// Set the off-track penalty
    pub fn green_penalty(mut self, penalty: f64) -> Self {
        self.green_penalty = penalty;
        self
    }

    /// Set the off-track detection threshold
    pub fn green_threshold(mut self, threshold: f64) -> Self {
        self.green_threshold = threshold;
        self
    }

    /// Set the rolling reward history length
    pub fn reward_memory_len(mut self, len: usize) -> Self {
        self.reward_memory_len = len;
        self
    }

    /// Set the stagnation threshold
    pub fn stagnation_threshold(mut self, threshold: f64) -> Self {
        self.stagnation_threshold = threshold;
        self
    }

    /// Set the solve threshold
    pub fn reward_threshold(mut self, threshold: f64) -> Self {
        self.reward_threshold = threshold;
        self
    }
}

/// Top-level training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Seed for weight initialization, action sampling and minibatch shuffling
    pub seed: u64,

    /// Forward `render()` to the simulator after every step
    pub render: bool,

    /// Report progress and save a checkpoint every this many episodes
    pub log_interval: usize,

    /// Upper bound on the number of episodes
    pub max_episodes: usize,

    /// Upper bound on agent steps per episode
    pub max_episode_steps: usize,

    /// Decay of the exponentially smoothed running score
    pub running_score_decay: f64,

    /// Where network parameters are written
    pub checkpoint_path: PathBuf,

    /// Checkpoint to restore before training starts
    pub resume_from: Option<PathBuf>,

    /// PPO hyperparameters
    pub ppo: PPOConfig,

    /// Environment adapter parameters
    pub env: EnvConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            render: false,
            log_interval: 10,
            max_episodes: 100_000,
            max_episode_steps: 1000,
            running_score_decay: 0.99,
            checkpoint_path: PathBuf::from("param/ppo_net_params.safetensors"),
            resume_from: None,
            ppo: PPOConfig::default(),
            env: EnvConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate this configuration and its nested sections
    pub fn validate(&self) -> Result<()> {
        if self.log_interval == 0 {
            return Err(anyhow!("log_interval must be positive"));
        }
        if self.max_episode_steps == 0 {
            return Err(anyhow!("max_episode_steps must be positive"));
        }
        if !(0.0..1.0).contains(&self.running_score_decay) {
            return Err(anyhow!("running_score_decay must be in [0, 1)"));
        }
        self.ppo.validate()?;
        self.env.validate()?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save this configuration as pretty-printed JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable rendering
    pub fn render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Set the log interval
    pub fn log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }

    /// Set the episode bound
    pub fn max_episodes(mut self, episodes: usize) -> Self {
        self.max_episodes = episodes;
        self
    }

    /// Set the per-episode step bound
    pub fn max_episode_steps(mut self, steps: usize) -> Self {
        self.max_episode_steps = steps;
        self
    }

    /// Set the checkpoint path
    pub fn checkpoint_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    /// Restore parameters from a checkpoint before training
    pub fn resume_from<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.resume_from = Some(path.into());
        self
    }

    /// Replace the PPO section
    pub fn ppo(mut self, ppo: PPOConfig) -> Self {
        self.ppo = ppo;
        self
    }

    /// Replace the environment section
    pub fn env(mut self, env: EnvConfig) -> Self {
        self.env = env;
        self
    }
}
