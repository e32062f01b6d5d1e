//! Bounded-support action distributions
//!
//! Action selection only needs two operations from a distribution: draw a
//! sample and score one. [`ActionDistribution`] captures exactly that so the
//! Beta family can be swapped for another bounded distribution.
//!
//! # Beta log-density
//!
//! ```text
//! log p(x; α, β) = (α - 1) ln x + (β - 1) ln(1 - x)
//!                + lnΓ(α + β) - lnΓ(α) - lnΓ(β)
//! ```

use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use tch::{Device, Kind, Tensor};

/// Samples are kept this far from 0 and 1 so their log-density stays finite
const SUPPORT_EPS: f64 = 1e-6;

/// Drawn when the shape parameters are not finite positive numbers
const DEGENERATE_SAMPLE: f32 = 0.5;

/// Distribution over per-dimension actions, batched on the leading axis
pub trait ActionDistribution {
    /// Draw one sample per row; shape matches the distribution parameters
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor>;

    /// Log-probability of `value`, summed over the action dimensions
    fn log_prob(&self, value: &Tensor) -> Tensor;
}

/// Independent Beta distributions per action dimension
#[derive(Debug)]
pub struct BetaDistribution {
    alpha: Tensor,
    beta: Tensor,
}

impl BetaDistribution {
    /// Create from shape parameters `[N, D]`
    pub fn new(alpha: Tensor, beta: Tensor) -> Self {
        debug_assert_eq!(alpha.size(), beta.size(), "alpha and beta shapes differ");
        Self { alpha, beta }
    }

    /// Concentration α
    pub fn alpha(&self) -> &Tensor {
        &self.alpha
    }

    /// Concentration β
    pub fn beta(&self) -> &Tensor {
        &self.beta
    }

    /// Mean `α / (α + β)` per dimension
    pub fn mean(&self) -> Tensor {
        &self.alpha / (&self.alpha + &self.beta)
    }

    /// Differential entropy, summed over action dimensions
    pub fn entropy(&self) -> Tensor {
        let (a, b) = (&self.alpha, &self.beta);
        let ab = a + b;
        let per_dim = log_beta_fn(a, b) - (a - 1.0) * a.digamma() - (b - 1.0) * b.digamma()
            + (&ab - 2.0) * ab.digamma();
        per_dim.sum_dim_intlist(-1, false, Kind::Float)
    }

    /// `KL(self || other)`, summed over action dimensions
    pub fn kl_divergence(&self, other: &BetaDistribution) -> Tensor {
        let (a1, b1) = (&self.alpha, &self.beta);
        let (a2, b2) = (&other.alpha, &other.beta);
        let ab1 = a1 + b1;
        let per_dim = log_beta_fn(a2, b2) - log_beta_fn(a1, b1)
            + (a1 - a2) * a1.digamma()
            + (b1 - b2) * b1.digamma()
            + (a2 - a1 + b2 - b1) * ab1.digamma();
        per_dim.sum_dim_intlist(-1, false, Kind::Float)
    }
}

/// `ln B(a, b) = lnΓ(a) + lnΓ(b) - lnΓ(a + b)`
fn log_beta_fn(a: &Tensor, b: &Tensor) -> Tensor {
    a.lgamma() + b.lgamma() - (a + b).lgamma()
}

/// Unit-scale Gamma, or `None` unless `shape` is finite and positive
fn gamma(shape: f64) -> Option<Gamma<f64>> {
    if shape.is_finite() && shape > 0.0 { Gamma::new(shape, 1.0).ok() } else { None }
}

fn to_cpu_vec(tensor: &Tensor) -> Result<Vec<f64>> {
    let flat = tensor.to_device(Device::Cpu).to_kind(Kind::Double).contiguous().view([-1]);
    Ok(Vec::<f64>::try_from(&flat)?)
}

impl ActionDistribution for BetaDistribution {
    /// Sample via `X / (X + Y)` with `X ~ Gamma(α, 1)`, `Y ~ Gamma(β, 1)`
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor> {
        let alphas = to_cpu_vec(&self.alpha)?;
        let betas = to_cpu_vec(&self.beta)?;

        let mut samples = Vec::with_capacity(alphas.len());
        for (&a, &b) in alphas.iter().zip(&betas) {
            let (Some(gamma_a), Some(gamma_b)) = (gamma(a), gamma(b)) else {
                tracing::warn!(alpha = a, beta = b, "degenerate Beta parameters, sampling 0.5");
                samples.push(DEGENERATE_SAMPLE);
                continue;
            };
            let x = gamma_a.sample(rng);
            let y = gamma_b.sample(rng);
            let v = if x + y > 0.0 { x / (x + y) } else { 0.5 };
            samples.push(v.clamp(SUPPORT_EPS, 1.0 - SUPPORT_EPS) as f32);
        }

        Ok(Tensor::from_slice(&samples)
            .view(self.alpha.size().as_slice())
            .to_kind(self.alpha.kind())
            .to_device(self.alpha.device()))
    }

    fn log_prob(&self, value: &Tensor) -> Tensor {
        let (a, b) = (&self.alpha, &self.beta);
        let value = value.to_kind(a.kind());
        let per_dim =
            (a - 1.0) * value.log() + (b - 1.0) * value.neg().log1p() - log_beta_fn(a, b);
        per_dim.sum_dim_intlist(-1, false, Kind::Float)
    }
}
