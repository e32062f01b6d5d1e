//! # Thrust Racing
//!
//! PPO training of a driving policy for a continuous-control racing
//! simulator, built on PyTorch's neural network capabilities (via tch-rs).
//!
//! The learning loop is single-threaded and sequential:
//!
//! ```text
//! Driver -> CarRacingEnv (reset/step) -> FrameStack -> RacingCNN (act)
//!        -> ExperienceBuffer (store) -> PPOTrainer::update (when full)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thrust_racing::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TrainConfig::default();
//! let simulator = ScriptedSimulator::new(ScriptedConfig::default());
//! let mut driver = TrainingDriver::new(config, simulator)?;
//! let summary = driver.run()?;
//! println!("solved: {}", summary.solved);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Process configuration
pub mod config;

/// Simulator boundary, frame preprocessing and the environment adapter
pub mod env;

/// Policy-value network and action distributions
pub mod policy;

/// Transitions and the fixed-capacity experience buffer
pub mod buffer;

/// PPO update rule, checkpointing and the training driver
pub mod train;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::{Action, ExperienceBuffer, Transition},
        config::{EnvConfig, TrainConfig},
        env::{
            Observation, RgbImage, SimStep, Simulator,
            car_racing::{CarRacingEnv, EnvStep},
            scripted::{ScriptedConfig, ScriptedSimulator},
        },
        policy::{ActionDistribution, BetaDistribution, RacingCNN},
        train::{
            Checkpointer, PPOConfig, PPOTrainer, TrainingDriver, TrainingStats, TrainingSummary,
        },
        utils::RunningScore,
    };
}

/// Current version of thrust-racing
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
