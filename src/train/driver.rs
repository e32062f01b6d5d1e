//! Episodic training loop
//!
//! The driver owns the environment adapter and the trainer and runs them
//! strictly in sequence: act, step, store, and update whenever the buffer
//! fills. Progress is reported every `log_interval` episodes, when a
//! checkpoint is also written. Training stops once the running score
//! exceeds the environment's solve threshold.

use anyhow::Result;
use tch::Device;

use super::{
    checkpoint::{CheckpointMeta, Checkpointer},
    ppo::{PPOTrainer, TrainingStats},
};
use crate::{
    buffer::Transition,
    config::TrainConfig,
    env::{Simulator, car_racing::CarRacingEnv},
    policy::RacingCNN,
    utils::RunningScore,
};

/// Progress line emitted every `log_interval` episodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Episode index, starting at zero
    pub episode: usize,

    /// Score of that episode
    pub last_score: f64,

    /// Running score after that episode
    pub running_score: f64,
}

/// Receiver of periodic progress reports
pub trait ProgressSink {
    /// Handle one report
    fn report(&mut self, report: &ProgressReport);
}

/// Logs progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&mut self, report: &ProgressReport) {
        tracing::info!(
            "Ep {}\tLast score: {:.2}\tMoving average score: {:.2}",
            report.episode,
            report.last_score,
            report.running_score
        );
    }
}

/// Outcome of one episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeRecord {
    /// Episode index, starting at zero
    pub episode: usize,

    /// Sum of shaped rewards
    pub score: f64,

    /// Running score after this episode
    pub running_score: f64,

    /// Agent steps taken
    pub steps: usize,
}

/// Result of [`TrainingDriver::run`]
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// Running score exceeded the solve threshold
    pub solved: bool,

    /// Final running score
    pub running_score: f64,

    /// PPO updates performed
    pub updates: usize,

    /// Statistics of the most recent update
    pub last_stats: Option<TrainingStats>,

    /// Every finished episode, in order
    pub records: Vec<EpisodeRecord>,
}

impl TrainingSummary {
    /// Number of episodes run
    pub fn episodes(&self) -> usize {
        self.records.len()
    }
}

/// Runs PPO training against a simulator
pub struct TrainingDriver<S> {
    config: TrainConfig,
    env: CarRacingEnv<S>,
    trainer: PPOTrainer,
    checkpointer: Checkpointer,
    sink: Box<dyn ProgressSink>,
    running_score: RunningScore,
}

impl<S: Simulator> TrainingDriver<S> {
    /// Build the network, trainer and environment adapter
    ///
    /// Seeds weight initialization from `config.seed` and restores
    /// `config.resume_from` when set.
    pub fn new(config: TrainConfig, simulator: S) -> Result<Self> {
        config.validate()?;
        tch::manual_seed(config.seed as i64);

        let device = Device::cuda_if_available();
        let mut policy = RacingCNN::new(config.env.img_stack as i64, device);
        if let Some(path) = &config.resume_from {
            Checkpointer::new(path.clone()).load(&mut policy)?;
            tracing::info!("Resumed parameters from {}", path.display());
        }
        tracing::info!("  Parameters: {}", policy.num_parameters());

        let trainer = PPOTrainer::new(config.ppo.clone(), policy, config.seed)?;
        let env = CarRacingEnv::new(simulator, config.env.clone())?;
        let checkpointer = Checkpointer::new(config.checkpoint_path.clone());
        let running_score = RunningScore::new(config.running_score_decay);

        Ok(Self {
            config,
            env,
            trainer,
            checkpointer,
            sink: Box::new(TracingSink),
            running_score,
        })
    }

    /// Replace the progress sink
    pub fn with_sink<P: ProgressSink + 'static>(mut self, sink: P) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Get the trainer
    pub fn trainer(&self) -> &PPOTrainer {
        &self.trainer
    }

    /// Get the environment adapter
    pub fn env(&self) -> &CarRacingEnv<S> {
        &self.env
    }

    /// Get the configuration
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Current running score
    pub fn running_score(&self) -> f64 {
        self.running_score.value()
    }

    /// Train until solved or `max_episodes` is reached
    pub fn run(&mut self) -> Result<TrainingSummary> {
        tracing::info!(
            "Starting training (up to {} episodes, solve threshold {})",
            self.config.max_episodes,
            self.env.reward_threshold()
        );

        let mut records = Vec::new();
        let mut last_stats = None;
        let mut solved = false;

        for episode in 0..self.config.max_episodes {
            let (score, steps) = self.run_episode(&mut last_stats)?;
            let running_score = self.running_score.update(score);
            records.push(EpisodeRecord { episode, score, running_score, steps });

            if episode % self.config.log_interval == 0 {
                self.sink.report(&ProgressReport { episode, last_score: score, running_score });
                let meta = CheckpointMeta {
                    episode,
                    running_score,
                    training_step: self.trainer.training_step(),
                };
                self.checkpointer.try_save(self.trainer.policy(), &meta);
            }

            if running_score > self.env.reward_threshold() {
                tracing::info!(
                    "Solved! Running reward is now {:.2} and the last episode scored {:.2}",
                    running_score,
                    score
                );
                solved = true;
                break;
            }
        }

        Ok(TrainingSummary {
            solved,
            running_score: self.running_score.value(),
            updates: self.trainer.training_step(),
            last_stats,
            records,
        })
    }

    /// Play one episode, updating whenever the buffer fills
    ///
    /// Returns the episode score and the number of agent steps.
    fn run_episode(&mut self, last_stats: &mut Option<TrainingStats>) -> Result<(f64, usize)> {
        let mut state = self.env.reset()?;
        let mut score = 0.0;
        let mut steps = 0;

        for _ in 0..self.config.max_episode_steps {
            let (action, log_prob) = self.trainer.select_action(&state)?;
            let step = self.env.step(&action.to_actuation())?;
            if self.config.render {
                self.env.render()?;
            }
            steps += 1;

            let terminal = step.is_terminal();
            let full = self.trainer.store(Transition {
                state,
                action,
                log_prob,
                reward: step.reward,
                next_state: step.observation.clone(),
            });
            if full {
                *last_stats = Some(self.trainer.update()?);
            }

            score += step.reward;
            state = step.observation;
            if terminal {
                break;
            }
        }

        Ok((score, steps))
    }
}
