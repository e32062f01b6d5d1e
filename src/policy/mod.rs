//! Policy networks and action distributions
//!
//! This module provides the actor-critic network using tch-rs for neural
//! networks, and the bounded distribution its actor head parameterizes.

pub mod distribution;
pub mod racing_cnn;

pub use distribution::{ActionDistribution, BetaDistribution};
pub use racing_cnn::RacingCNN;
