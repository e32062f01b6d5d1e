//! Training statistics for PPO
//!
//! This module defines the metrics reported by one PPO update, accumulated
//! over its minibatches and then averaged.

use std::ops::AddAssign;

/// Training statistics for a PPO update
///
/// Tracks losses, policy drift and gradient norms. After [`average`] every
/// field except `num_updates` and `max_clipped_grad_norm` is a per-minibatch
/// mean.
///
/// [`average`]: TrainingStats::average
#[derive(Debug, Clone, Default)]
pub struct TrainingStats {
    /// Clipped surrogate policy loss
    pub policy_loss: f64,

    /// Smooth-L1 value loss
    pub value_loss: f64,

    /// `policy_loss + vf_coef * value_loss`
    pub total_loss: f64,

    /// Fraction of samples whose ratio left `[1 - eps, 1 + eps]`
    pub clip_fraction: f64,

    /// Approximate KL divergence between old and new policies
    pub approx_kl: f64,

    /// Global gradient norm before clipping
    pub grad_norm: f64,

    /// Global gradient norm after clipping
    pub clipped_grad_norm: f64,

    /// Largest post-clip gradient norm seen
    pub max_clipped_grad_norm: f64,

    /// Number of gradient steps performed
    pub num_updates: usize,
}

impl TrainingStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Statistics of a single gradient step
    pub fn new(
        policy_loss: f64,
        value_loss: f64,
        total_loss: f64,
        clip_fraction: f64,
        approx_kl: f64,
        grad_norm: f64,
        clipped_grad_norm: f64,
    ) -> Self {
        Self {
            policy_loss,
            value_loss,
            total_loss,
            clip_fraction,
            approx_kl,
            grad_norm,
            clipped_grad_norm,
            max_clipped_grad_norm: clipped_grad_norm,
            num_updates: 1,
        }
    }

    /// Add another statistics instance to this one
    pub fn add(&mut self, other: &TrainingStats) {
        self.policy_loss += other.policy_loss;
        self.value_loss += other.value_loss;
        self.total_loss += other.total_loss;
        self.clip_fraction += other.clip_fraction;
        self.approx_kl += other.approx_kl;
        self.grad_norm += other.grad_norm;
        self.clipped_grad_norm += other.clipped_grad_norm;
        self.max_clipped_grad_norm = self.max_clipped_grad_norm.max(other.max_clipped_grad_norm);
        self.num_updates += other.num_updates;
    }

    /// Compute average statistics across the accumulated steps
    pub fn average(&self) -> Self {
        let scale = self.num_updates as f64;
        if scale == 0.0 {
            return Self::zeros();
        }

        Self {
            policy_loss: self.policy_loss / scale,
            value_loss: self.value_loss / scale,
            total_loss: self.total_loss / scale,
            clip_fraction: self.clip_fraction / scale,
            approx_kl: self.approx_kl / scale,
            grad_norm: self.grad_norm / scale,
            clipped_grad_norm: self.clipped_grad_norm / scale,
            max_clipped_grad_norm: self.max_clipped_grad_norm,
            num_updates: self.num_updates,
        }
    }
}

impl AddAssign<&TrainingStats> for TrainingStats {
    fn add_assign(&mut self, other: &TrainingStats) {
        self.add(other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        let mut stats = TrainingStats::zeros();
        stats += &TrainingStats::new(1.0, 2.0, 5.0, 0.5, 0.01, 3.0, 0.5);
        stats += &TrainingStats::new(3.0, 4.0, 11.0, 0.0, 0.03, 0.2, 0.2);

        let avg = stats.average();
        assert_eq!(avg.num_updates, 2);
        assert!((avg.policy_loss - 2.0).abs() < 1e-12);
        assert!((avg.value_loss - 3.0).abs() < 1e-12);
        assert!((avg.total_loss - 8.0).abs() < 1e-12);
        assert!((avg.approx_kl - 0.02).abs() < 1e-12);
        assert!((avg.grad_norm - 1.6).abs() < 1e-12);
        assert!((avg.clipped_grad_norm - 0.35).abs() < 1e-12);
        assert_eq!(avg.max_clipped_grad_norm, 0.5);
    }

    #[test]
    fn test_average_of_nothing() {
        let avg = TrainingStats::zeros().average();
        assert_eq!(avg.num_updates, 0);
        assert_eq!(avg.total_loss, 0.0);
    }
}
