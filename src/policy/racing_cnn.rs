//! Convolutional actor-critic for the racing task
//!
//! # Architecture
//!
//! ```text
//! Input [N, K, 96, 96]
//!     |
//! Conv(K->8,   k4 s2) ReLU   -> 47x47
//! Conv(8->16,  k3 s2) ReLU   -> 23x23
//! Conv(16->32, k3 s2) ReLU   -> 11x11
//! Conv(32->64, k3 s2) ReLU   -> 5x5
//! Conv(64->128, k3 s1) ReLU  -> 3x3
//! Conv(128->256, k3 s1) ReLU -> 1x1
//!     |
//!  [256]
//!   /    \
//! Value   Actor trunk
//! 256->100 ReLU   256->100 ReLU
//! 100->1           /        \
//!              alpha       beta
//!          100->3 Softplus  100->3 Softplus
//!              +1            +1
//! ```
//!
//! Both Beta concentrations are at least 1, so the distribution is unimodal
//! (or uniform) on `[0, 1]`.

use anyhow::{Result, bail};
use tch::{
    Device, Kind, Tensor,
    nn::{
        self, Module, OptimizerConfig,
        init::{FanInOut, NonLinearity, NormalOrUniform},
    },
};

use super::distribution::BetaDistribution;
use crate::{
    buffer::ACTION_DIM,
    env::frame::{FRAME_HEIGHT, FRAME_WIDTH},
};

/// Width of the convolutional feature vector
pub const FEATURE_DIM: i64 = 256;

/// Hidden width of the value branch and actor trunk
pub const HIDDEN_DIM: i64 = 100;

/// Conv bias init keeps ReLUs active early in training
const CONV_BIAS_INIT: f64 = 0.1;

/// (in, out, kernel, stride) after the first layer
const CONV_STACK: [(i64, i64, i64, i64); 5] =
    [(8, 16, 3, 2), (16, 32, 3, 2), (32, 64, 3, 2), (64, 128, 3, 1), (128, 256, 3, 1)];

fn conv_config(stride: i64) -> nn::ConvConfig {
    nn::ConvConfig {
        stride,
        ws_init: nn::Init::Kaiming {
            dist: NormalOrUniform::Uniform,
            fan: FanInOut::FanIn,
            non_linearity: NonLinearity::ReLU,
        },
        bs_init: nn::Init::Const(CONV_BIAS_INIT),
        ..Default::default()
    }
}

/// Policy-value network producing Beta parameters and a state value
pub struct RacingCNN {
    vs: nn::VarStore,
    cnn_base: nn::Sequential,
    value_head: nn::Sequential,
    actor_trunk: nn::Sequential,
    alpha_head: nn::Sequential,
    beta_head: nn::Sequential,
    img_stack: i64,
    device: Device,
}

impl std::fmt::Debug for RacingCNN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RacingCNN")
            .field("img_stack", &self.img_stack)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl RacingCNN {
    /// Create a network for `img_stack` stacked frames on `device`
    ///
    /// Call `tch::manual_seed` beforehand for reproducible weights.
    pub fn new(img_stack: i64, device: Device) -> Self {
        tracing::info!("RacingCNN using device: {:?}", device);
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let mut cnn_base = nn::seq()
            .add(nn::conv2d(&root / "cnn" / "conv0", img_stack, 8, 4, conv_config(2)))
            .add_fn(|x| x.relu());
        for (i, &(c_in, c_out, kernel, stride)) in CONV_STACK.iter().enumerate() {
            cnn_base = cnn_base
                .add(nn::conv2d(
                    &root / "cnn" / format!("conv{}", i + 1),
                    c_in,
                    c_out,
                    kernel,
                    conv_config(stride),
                ))
                .add_fn(|x| x.relu());
        }

        let value_head = nn::seq()
            .add(nn::linear(&root / "value" / "fc1", FEATURE_DIM, HIDDEN_DIM, Default::default()))
            .add_fn(|x| x.relu())
            .add(nn::linear(&root / "value" / "fc2", HIDDEN_DIM, 1, Default::default()));

        let actor_trunk = nn::seq()
            .add(nn::linear(&root / "actor" / "fc", FEATURE_DIM, HIDDEN_DIM, Default::default()))
            .add_fn(|x| x.relu());

        let alpha_head = nn::seq()
            .add(nn::linear(&root / "alpha", HIDDEN_DIM, ACTION_DIM as i64, Default::default()))
            .add_fn(|x| x.softplus());
        let beta_head = nn::seq()
            .add(nn::linear(&root / "beta", HIDDEN_DIM, ACTION_DIM as i64, Default::default()))
            .add_fn(|x| x.softplus());

        Self { vs, cnn_base, value_head, actor_trunk, alpha_head, beta_head, img_stack, device }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `obs` - Observation tensor `[N, K, 96, 96]`
    ///
    /// # Returns
    /// * `((alpha, beta), value)` - Beta parameters `[N, 3]` (each >= 1) and
    ///   state values `[N]`
    pub fn forward(&self, obs: &Tensor) -> ((Tensor, Tensor), Tensor) {
        let features = self.cnn_base.forward(obs).view([-1, FEATURE_DIM]);
        let value = self.value_head.forward(&features).squeeze_dim(-1);
        let hidden = self.actor_trunk.forward(&features);
        let alpha = self.alpha_head.forward(&hidden) + 1.0;
        let beta = self.beta_head.forward(&hidden) + 1.0;
        ((alpha, beta), value)
    }

    /// Action distribution and state values for a batch of observations
    pub fn distribution(&self, obs: &Tensor) -> (BetaDistribution, Tensor) {
        let ((alpha, beta), value) = self.forward(obs);
        (BetaDistribution::new(alpha, beta), value)
    }

    /// State values only
    pub fn value(&self, obs: &Tensor) -> Tensor {
        self.forward(obs).1
    }

    /// Check that an observation batch matches the network input
    pub fn check_input(&self, obs: &Tensor) -> Result<()> {
        let expected = [self.img_stack, FRAME_HEIGHT as i64, FRAME_WIDTH as i64];
        let size = obs.size();
        if size.len() != 4 || size[1..] != expected {
            bail!("observation batch {:?} does not match [N, {:?}]", size, expected);
        }
        Ok(())
    }

    /// Number of stacked input frames
    pub fn img_stack(&self) -> i64 {
        self.img_stack
    }

    /// Get the device this network is on (CPU or CUDA)
    pub fn device(&self) -> Device {
        self.device
    }

    /// Get reference to variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Get mutable reference to variable store
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    /// Create an Adam optimizer over all parameters
    pub fn optimizer(&self, learning_rate: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.vs, learning_rate)?)
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.vs.trainable_variables().iter().map(|t| t.numel()).sum()
    }

    /// Save all weight tensors
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Restore all weight tensors saved by [`RacingCNN::save`]
    pub fn load<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }

    /// Copy of every named parameter, for comparisons in diagnostics
    pub fn snapshot(&self) -> Vec<(String, Tensor)> {
        let mut vars: Vec<(String, Tensor)> = self
            .vs
            .variables()
            .into_iter()
            .map(|(name, t)| (name, t.detach().to_kind(Kind::Float).copy()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(n: i64) -> Tensor {
        Tensor::rand([n, 4, 96, 96], (Kind::Float, Device::Cpu)) * 2.0 - 1.0
    }

    #[test]
    fn test_forward_shapes() {
        let net = RacingCNN::new(4, Device::Cpu);
        let ((alpha, beta), value) = net.forward(&observations(5));

        assert_eq!(alpha.size(), vec![5, 3]);
        assert_eq!(beta.size(), vec![5, 3]);
        assert_eq!(value.size(), vec![5]);
    }

    #[test]
    fn test_concentrations_at_least_one() {
        let net = RacingCNN::new(4, Device::Cpu);
        let ((alpha, beta), _) = net.forward(&observations(8));

        let min_alpha = f64::try_from(alpha.min()).unwrap();
        let min_beta = f64::try_from(beta.min()).unwrap();
        assert!(min_alpha >= 1.0);
        assert!(min_beta >= 1.0);
    }

    #[test]
    fn test_conv_bias_init() {
        let net = RacingCNN::new(4, Device::Cpu);
        let vars = net.var_store().variables();
        for i in 0..6 {
            let bias = vars.get(&format!("cnn.conv{}.bias", i)).expect("conv bias");
            let max_dev = f64::try_from((bias - CONV_BIAS_INIT).abs().max()).unwrap();
            assert!(max_dev < 1e-6);
        }
    }

    #[test]
    fn test_check_input() {
        let net = RacingCNN::new(4, Device::Cpu);
        assert!(net.check_input(&observations(2)).is_ok());
        assert!(net.check_input(&Tensor::zeros([2, 3, 96, 96], (Kind::Float, Device::Cpu))).is_err());
        assert!(net.check_input(&Tensor::zeros([4, 96, 96], (Kind::Float, Device::Cpu))).is_err());
    }

    #[test]
    fn test_batch_consistency() {
        let net = RacingCNN::new(4, Device::Cpu);
        let single = observations(1);
        let ((alpha_single, _), value_single) = net.forward(&single);
        let ((alpha_batch, _), value_batch) = net.forward(&single.repeat([6, 1, 1, 1]));

        for i in 0..6 {
            let diff = (&alpha_single.get(0) - &alpha_batch.get(i)).abs().max();
            assert!(f64::try_from(diff).unwrap() < 1e-5);
            let diff = (&value_single.get(0) - &value_batch.get(i)).abs();
            assert!(f64::try_from(diff).unwrap() < 1e-5);
        }
    }

    #[test]
    fn test_save_load() -> Result<()> {
        tch::manual_seed(1);
        let net = RacingCNN::new(4, Device::Cpu);
        tch::manual_seed(2);
        let mut other = RacingCNN::new(4, Device::Cpu);
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("racing.safetensors");

        let obs = observations(3);
        let (_, value_before) = net.forward(&obs);
        let (_, value_other) = other.forward(&obs);
        assert!(!value_before.allclose(&value_other, 1e-6, 1e-6, false));

        net.save(&path)?;
        other.load(&path)?;

        for ((name_a, a), (name_b, b)) in net.snapshot().iter().zip(other.snapshot().iter()) {
            assert_eq!(name_a, name_b);
            assert!(a.equal(b), "tensor {} differs after load", name_a);
        }
        let (_, value_after) = other.forward(&obs);
        assert!(value_before.allclose(&value_after, 1e-6, 1e-6, false));
        Ok(())
    }

    #[test]
    fn test_parameter_count() {
        let net = RacingCNN::new(4, Device::Cpu);
        let conv = (4 * 8 * 16 + 8)
            + (8 * 16 * 9 + 16)
            + (16 * 32 * 9 + 32)
            + (32 * 64 * 9 + 64)
            + (64 * 128 * 9 + 128)
            + (128 * 256 * 9 + 256);
        let value = (256 * 100 + 100) + (100 + 1);
        let actor = (256 * 100 + 100) + 2 * (100 * 3 + 3);
        assert_eq!(net.num_parameters(), conv + value + actor);
    }
}
