//! PPO Trainer implementation
//!
//! This module contains the main PPOTrainer struct: action selection under
//! the current policy, transition storage, and the clipped-surrogate update
//! that runs once the experience buffer is full.

use anyhow::{Result, anyhow};
use rand::{SeedableRng, rngs::StdRng};
use tch::{Kind, Tensor, nn};

use super::{config::PPOConfig, loss::*, stats::TrainingStats};
use crate::{
    buffer::{Action, ExperienceBuffer, Transition},
    env::Observation,
    policy::{ActionDistribution, RacingCNN},
};

/// PPO Trainer for policy optimization
///
/// Owns the network, its Adam optimizer and the experience buffer. Network
/// parameters change only inside [`PPOTrainer::update`].
#[derive(Debug)]
pub struct PPOTrainer {
    config: PPOConfig,
    policy: RacingCNN,
    optimizer: nn::Optimizer,
    buffer: ExperienceBuffer,
    rng: StdRng,
    training_step: usize,
}

impl PPOTrainer {
    /// Create a new PPO trainer
    ///
    /// # Arguments
    ///
    /// * `config` - PPO configuration parameters
    /// * `policy` - Policy-value network
    /// * `seed` - Seed for action sampling and minibatch shuffling
    pub fn new(config: PPOConfig, policy: RacingCNN, seed: u64) -> Result<Self> {
        config.validate()?;
        let optimizer = policy.optimizer(config.learning_rate)?;
        let buffer = ExperienceBuffer::new(config.buffer_capacity);

        Ok(Self {
            config,
            policy,
            optimizer,
            buffer,
            rng: StdRng::seed_from_u64(seed),
            training_step: 0,
        })
    }

    /// Get reference to the policy
    pub fn policy(&self) -> &RacingCNN {
        &self.policy
    }

    /// Get mutable reference to the policy
    pub fn policy_mut(&mut self) -> &mut RacingCNN {
        &mut self.policy
    }

    /// Get the configuration
    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    /// Get the experience buffer
    pub fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    /// Number of updates performed so far
    pub fn training_step(&self) -> usize {
        self.training_step
    }

    /// Sample an action for one observation
    ///
    /// Runs without gradient tracking. Returns the raw Beta sample in
    /// `[0, 1]^3` together with its log-probability.
    pub fn select_action(&mut self, observation: &Observation) -> Result<(Action, f64)> {
        let input = observation.to_tensor(self.policy.device());
        self.policy.check_input(&input)?;

        let (dist, _) = tch::no_grad(|| self.policy.distribution(&input));
        let sample = dist.sample(&mut self.rng)?;
        let log_prob = f64::try_from(dist.log_prob(&sample).squeeze())?;

        let values: Vec<f32> = Vec::try_from(sample.to_kind(Kind::Float).view([-1]))?;
        let action = Action::from_slice(&values)
            .ok_or_else(|| anyhow!("expected a 3-dimensional action, got {}", values.len()))?;
        Ok((action, log_prob))
    }

    /// Store a transition; returns true when the buffer just became full
    pub fn store(&mut self, transition: Transition) -> bool {
        self.buffer.store(transition)
    }

    /// Log-probabilities of `actions` under the current parameters
    ///
    /// Evaluated without gradient tracking.
    pub fn evaluate_log_probs(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let (dist, _) = self.policy.distribution(states);
            dist.log_prob(actions)
        })
    }

    /// Run one PPO update over the full buffer
    ///
    /// This performs:
    /// 1. One-step TD targets and advantages from the frozen parameters
    /// 2. `n_epochs` passes of shuffled minibatches
    /// 3. A clipped gradient step per minibatch
    ///
    /// # Returns
    /// Training statistics averaged over all minibatches
    pub fn update(&mut self) -> Result<TrainingStats> {
        let device = self.policy.device();
        let batch = self.buffer.to_batch(device)?;
        self.training_step += 1;
        tracing::info!("Updating");

        let (target_v, advantages) = tch::no_grad(|| {
            let values = self.policy.value(&batch.states);
            let next_values = self.policy.value(&batch.next_states);
            compute_td_targets(&batch.rewards, &values, &next_values, self.config.gamma)
        });

        let capacity = self.buffer.capacity();
        let mut stats_sum = TrainingStats::zeros();

        for epoch in 0..self.config.n_epochs {
            let minibatches =
                generate_minibatch_indices(capacity, self.config.batch_size, &mut self.rng);

            for indices in &minibatches {
                let indices_i64: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
                let index = Tensor::from_slice(&indices_i64).to_device(device);

                let mb_states = batch.states.index_select(0, &index);
                let mb_actions = batch.actions.index_select(0, &index);
                let mb_old_log_probs = batch.old_log_probs.index_select(0, &index);
                let mb_advantages = advantages.index_select(0, &index);
                let mb_targets = target_v.index_select(0, &index);

                // One forward pass serves both heads
                let (dist, values) = self.policy.distribution(&mb_states);
                let log_probs = dist.log_prob(&mb_actions);

                let (policy_loss, clip_fraction, approx_kl) = compute_policy_loss(
                    &log_probs,
                    &mb_old_log_probs,
                    &mb_advantages,
                    self.config.clip_range,
                );
                let value_loss = compute_value_loss(&values, &mb_targets);
                let loss = &policy_loss + &value_loss * self.config.vf_coef;

                let policy_loss_val = f64::try_from(&policy_loss)?;
                let value_loss_val = f64::try_from(&value_loss)?;
                let total_loss_val = f64::try_from(&loss)?;

                self.optimizer.zero_grad();
                loss.backward();
                let grad_norm = global_grad_norm(self.policy.var_store());
                self.optimizer.clip_grad_norm(self.config.max_grad_norm);
                let clipped_grad_norm = global_grad_norm(self.policy.var_store());
                self.optimizer.step();

                tracing::debug!(
                    epoch,
                    policy_loss = policy_loss_val,
                    value_loss = value_loss_val,
                    grad_norm,
                    "minibatch"
                );

                stats_sum += &TrainingStats::new(
                    policy_loss_val,
                    value_loss_val,
                    total_loss_val,
                    clip_fraction,
                    approx_kl,
                    grad_norm,
                    clipped_grad_norm,
                );
            }
        }

        let stats = stats_sum.average();
        tracing::info!(
            step = self.training_step,
            policy_loss = stats.policy_loss,
            value_loss = stats.value_loss,
            approx_kl = stats.approx_kl,
            clip_fraction = stats.clip_fraction,
            "update done"
        );
        Ok(stats)
    }
}

/// Global L2 norm of all parameter gradients
fn global_grad_norm(vs: &nn::VarStore) -> f64 {
    tch::no_grad(|| {
        let sum_sq: f64 = vs
            .trainable_variables()
            .iter()
            .map(|var| var.grad())
            .filter(|grad| grad.defined())
            .map(|grad| f64::try_from(grad.square().sum(Kind::Double)).unwrap_or(0.0))
            .sum();
        sum_sq.sqrt()
    })
}

#[cfg(test)]
mod tests {
    use tch::Device;

    use super::*;
    use crate::env::{FrameStack, scripted::ScriptedSimulator, to_gray};

    fn observation(tick: usize) -> Observation {
        let config = crate::env::scripted::ScriptedConfig::default();
        let mut stack = FrameStack::new(to_gray(&ScriptedSimulator::frame_at(&config, 0), true), 4);
        stack.push_frame(to_gray(&ScriptedSimulator::frame_at(&config, tick), true)).unwrap();
        stack.observation()
    }

    fn trainer(config: PPOConfig) -> PPOTrainer {
        tch::manual_seed(0);
        PPOTrainer::new(config, RacingCNN::new(4, Device::Cpu), 0).unwrap()
    }

    #[test]
    fn test_select_action_in_unit_box() {
        let mut trainer = trainer(PPOConfig::new().buffer_capacity(8));
        for tick in 0..10 {
            let (action, log_prob) = trainer.select_action(&observation(tick)).unwrap();
            for v in action.as_array() {
                assert!((0.0..=1.0).contains(&v));
            }
            assert!(log_prob.is_finite());
        }
    }

    #[test]
    fn test_select_action_rejects_wrong_depth() {
        let mut trainer = trainer(PPOConfig::new().buffer_capacity(8));
        let obs = Observation::from_vec(2, 96, 96, vec![0.0; 2 * 96 * 96]).unwrap();
        assert!(trainer.select_action(&obs).is_err());
    }

    #[test]
    fn test_update_requires_full_buffer() {
        let mut trainer = trainer(PPOConfig::new().buffer_capacity(4));
        let (action, log_prob) = trainer.select_action(&observation(0)).unwrap();
        let full = trainer.store(Transition {
            state: observation(0),
            action,
            log_prob,
            reward: 1.0,
            next_state: observation(1),
        });
        assert!(!full);
        assert!(trainer.update().is_err());
        assert_eq!(trainer.training_step(), 0);
    }

    #[test]
    fn test_update_counts_minibatches() {
        let config = PPOConfig::new().buffer_capacity(10).batch_size(4).n_epochs(2);
        let mut trainer = trainer(config);

        let mut full = false;
        for tick in 0..10 {
            let state = observation(tick);
            let (action, log_prob) = trainer.select_action(&state).unwrap();
            full = trainer.store(Transition {
                state,
                action,
                log_prob,
                reward: 0.1,
                next_state: observation(tick + 1),
            });
        }
        assert!(full);

        let stats = trainer.update().unwrap();
        // 4 + 4 + 2 per epoch
        assert_eq!(stats.num_updates, 6);
        assert!(stats.total_loss.is_finite());
        assert!(stats.max_clipped_grad_norm <= 0.5 + 1e-4);
        assert_eq!(trainer.training_step(), 1);
    }
}
