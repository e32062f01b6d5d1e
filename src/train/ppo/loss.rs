//! Loss computation functions for PPO
//!
//! This module contains the core loss computation functions used in PPO
//! training: one-step TD targets, the clipped policy loss and the Huber value
//! loss, plus minibatch index generation.

use rand::{Rng, seq::SliceRandom};
use tch::{Kind, Reduction, Tensor};

/// Compute one-step TD targets and advantages
///
/// Returns `(target_v, advantages)` where `target_v = r + gamma * V(s')` and
/// `advantages = target_v - V(s)`. Callers evaluate `values` and
/// `next_values` under `tch::no_grad` so neither result carries gradients.
///
/// # Arguments
/// * `rewards` - Shaped rewards `[N]`
/// * `values` - Value estimates of the states `[N]`
/// * `next_values` - Value estimates of the next states `[N]`
/// * `gamma` - Discount factor
pub fn compute_td_targets(
    rewards: &Tensor,
    values: &Tensor,
    next_values: &Tensor,
    gamma: f64,
) -> (Tensor, Tensor) {
    let target_v = rewards + next_values * gamma;
    let advantages = &target_v - values;
    (target_v.detach(), advantages.detach())
}

/// Compute PPO policy loss with clipping
///
/// Returns (policy_loss, clip_fraction, approx_kl)
///
/// # Arguments
/// * `log_probs` - Log probabilities of actions under current policy
/// * `old_log_probs` - Log probabilities of actions under old policy
/// * `advantages` - Computed advantages
/// * `clip_range` - PPO clipping parameter (epsilon)
pub fn compute_policy_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    clip_range: f64,
) -> (Tensor, f64, f64) {
    let ratio = (log_probs - old_log_probs).exp();

    let clipped_ratio = ratio.clamp(1.0 - clip_range, 1.0 + clip_range);
    let surrogate_1 = advantages * &ratio;
    let surrogate_2 = advantages * clipped_ratio;
    let policy_loss = -surrogate_1.minimum(&surrogate_2).mean(Kind::Float);

    let clip_fraction =
        (&ratio - 1.0).abs().gt(clip_range).to_kind(Kind::Float).mean(Kind::Float);
    let approx_kl = (old_log_probs - log_probs).mean(Kind::Float);

    (
        policy_loss,
        f64::try_from(&clip_fraction).unwrap_or(0.0),
        f64::try_from(&approx_kl).unwrap_or(0.0),
    )
}

/// Compute the probability ratio `exp(log_probs - old_log_probs)`
pub fn probability_ratio(log_probs: &Tensor, old_log_probs: &Tensor) -> Tensor {
    (log_probs - old_log_probs).exp()
}

/// Compute value function loss
///
/// Smooth-L1 (Huber, beta 1) regression of `values` toward `targets`,
/// averaged over the minibatch.
pub fn compute_value_loss(values: &Tensor, targets: &Tensor) -> Tensor {
    values.smooth_l1_loss(targets, Reduction::Mean, 1.0)
}

/// Generate minibatch indices for PPO training
///
/// Shuffles `0..buffer_size` and cuts it into chunks of `batch_size`; the
/// last chunk holds the remainder. Every index appears exactly once.
///
/// # Returns
/// Vector of vectors, where each inner vector contains indices for one minibatch
pub fn generate_minibatch_indices<R: Rng + ?Sized>(
    buffer_size: usize,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..buffer_size).collect();
    indices.shuffle(rng);

    indices.chunks(batch_size.max(1)).map(|chunk| chunk.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn scalar(t: &Tensor) -> f64 {
        f64::try_from(t).unwrap()
    }

    #[test]
    fn test_minibatch_partition() {
        let mut rng = StdRng::seed_from_u64(0);
        let batches = generate_minibatch_indices(2000, 120, &mut rng);

        assert_eq!(batches.len(), 17);
        assert!(batches[..16].iter().all(|b| b.len() == 120));
        assert_eq!(batches[16].len(), 80);

        let mut all: Vec<usize> = batches.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..2000).collect::<Vec<_>>());
    }

    #[test]
    fn test_minibatch_shuffle_is_seeded() {
        let a = generate_minibatch_indices(100, 10, &mut StdRng::seed_from_u64(4));
        let b = generate_minibatch_indices(100, 10, &mut StdRng::seed_from_u64(4));
        let c = generate_minibatch_indices(100, 10, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_td_targets() {
        let rewards = Tensor::from_slice(&[1.0f32, -0.5]);
        let values = Tensor::from_slice(&[2.0f32, 0.0]);
        let next_values = Tensor::from_slice(&[3.0f32, 1.0]);

        let (target_v, adv) = compute_td_targets(&rewards, &values, &next_values, 0.5);
        let target_v: Vec<f32> = Vec::try_from(&target_v).unwrap();
        let adv: Vec<f32> = Vec::try_from(&adv).unwrap();
        assert_eq!(target_v, vec![2.5, 0.0]);
        assert_eq!(adv, vec![0.5, 0.0]);
    }

    #[test]
    fn test_policy_loss_unit_ratio() {
        let log_probs = Tensor::from_slice(&[-1.0f32, -2.0, -0.5]);
        let advantages = Tensor::from_slice(&[1.0f32, -2.0, 4.0]);

        let ratio = probability_ratio(&log_probs, &log_probs);
        let ratio: Vec<f32> = Vec::try_from(&ratio).unwrap();
        assert!(ratio.iter().all(|&r| r == 1.0));

        let (loss, clip_fraction, approx_kl) =
            compute_policy_loss(&log_probs, &log_probs, &advantages, 0.1);
        assert!((scalar(&loss) + 1.0).abs() < 1e-6);
        assert_eq!(clip_fraction, 0.0);
        assert_eq!(approx_kl, 0.0);
    }

    #[test]
    fn test_policy_loss_clipping() {
        // ratio = 2 for both samples
        let old_log_probs = Tensor::from_slice(&[0.0f32, 0.0]);
        let log_probs = Tensor::from_slice(&[2f32.ln(), 2f32.ln()]);

        // Positive advantage: gain capped at (1 + eps) * adv
        let (loss, clip_fraction, _) = compute_policy_loss(
            &log_probs,
            &old_log_probs,
            &Tensor::from_slice(&[1.0f32, 1.0]),
            0.1,
        );
        assert!((scalar(&loss) + 1.1).abs() < 1e-5);
        assert_eq!(clip_fraction, 1.0);

        // Negative advantage: the unclipped, more pessimistic term wins
        let (loss, _, _) = compute_policy_loss(
            &log_probs,
            &old_log_probs,
            &Tensor::from_slice(&[-1.0f32, -1.0]),
            0.1,
        );
        assert!((scalar(&loss) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_policy_loss_clipping_low_ratio() {
        // ratio = 0.5, below 1 - eps
        let old_log_probs = Tensor::from_slice(&[0.0f32]);
        let log_probs = Tensor::from_slice(&[0.5f32.ln()]);

        // Positive advantage: the unclipped, smaller term wins
        let (loss, _, _) =
            compute_policy_loss(&log_probs, &old_log_probs, &Tensor::from_slice(&[1.0f32]), 0.1);
        assert!((scalar(&loss) + 0.5).abs() < 1e-5);

        // Negative advantage: the clipped term (1 - eps) * adv wins
        let (loss, clip_fraction, _) =
            compute_policy_loss(&log_probs, &old_log_probs, &Tensor::from_slice(&[-1.0f32]), 0.1);
        assert!((scalar(&loss) - 0.9).abs() < 1e-5);
        assert_eq!(clip_fraction, 1.0);
    }

    #[test]
    fn test_value_loss_is_huber() {
        let values = Tensor::from_slice(&[0.0f32, 0.0]);
        let targets = Tensor::from_slice(&[0.5f32, 3.0]);

        // 0.5 * 0.5^2 for the small error, 3 - 0.5 for the large one
        let loss = scalar(&compute_value_loss(&values, &targets));
        assert!((loss - (0.125 + 2.5) / 2.0).abs() < 1e-6);
    }
}
