//! Proximal Policy Optimization (PPO) algorithm
//!
//! PPO is a policy gradient method that uses a clipped surrogate objective
//! to ensure stable, reliable policy updates.
//!
//! # Algorithm Overview
//!
//! ```text
//! When the buffer holds C transitions:
//!   1. target_v = r + gamma * V(s'), adv = target_v - V(s)   (no grad)
//!   2. For n_epochs passes:
//!      a. Shuffle 0..C into minibatches of batch_size
//!      b. ratio = exp(log_pi(a|s) - log_pi_old(a|s))
//!      c. loss = -mean(min(ratio * adv, clip(ratio, 1-eps, 1+eps) * adv))
//!               + vf_coef * smooth_l1(V(s), target_v)
//!      d. Clip the global gradient norm, then step Adam
//! ```
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)

mod config;
mod loss;
mod stats;
mod trainer;

pub use config::PPOConfig;
pub use loss::{
    compute_policy_loss, compute_td_targets, compute_value_loss, generate_minibatch_indices,
    probability_ratio,
};
pub use stats::TrainingStats;
pub use trainer::PPOTrainer;
