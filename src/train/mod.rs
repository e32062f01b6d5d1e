//! Training algorithms
//!
//! PPO update rule, checkpoint persistence and the episodic training driver.

pub mod checkpoint;
pub mod driver;
pub mod ppo;

pub use checkpoint::{CheckpointMeta, Checkpointer};
pub use driver::{
    EpisodeRecord, ProgressReport, ProgressSink, TracingSink, TrainingDriver, TrainingSummary,
};
pub use ppo::{
    PPOConfig, PPOTrainer, TrainingStats, compute_policy_loss, compute_td_targets,
    compute_value_loss, generate_minibatch_indices, probability_ratio,
};
