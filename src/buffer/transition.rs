//! Actions and transitions

use crate::env::Observation;

/// Number of action dimensions (steering, gas, brake)
pub const ACTION_DIM: usize = 3;

/// Affine map from the Beta support `[0, 1]` to the actuation range
const ACTUATION_SCALE: [f32; ACTION_DIM] = [2.0, 1.0, 1.0];
const ACTUATION_OFFSET: [f32; ACTION_DIM] = [-1.0, 0.0, 0.0];

/// Three-dimensional continuous control vector
///
/// Policy samples live in `[0, 1]^3`; [`Action::to_actuation`] maps them to
/// the simulator range (steering in `[-1, 1]`, gas and brake in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action([f32; ACTION_DIM]);

impl Action {
    /// Wrap raw action values
    pub fn new(values: [f32; ACTION_DIM]) -> Self {
        Self(values)
    }

    /// Build from a slice of exactly [`ACTION_DIM`] values
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        <[f32; ACTION_DIM]>::try_from(values).ok().map(Self)
    }

    /// Steering component
    pub fn steering(&self) -> f32 {
        self.0[0]
    }

    /// Gas component
    pub fn gas(&self) -> f32 {
        self.0[1]
    }

    /// Brake component
    pub fn brake(&self) -> f32 {
        self.0[2]
    }

    /// Raw values
    pub fn as_array(&self) -> [f32; ACTION_DIM] {
        self.0
    }

    /// Rescale a `[0, 1]` sample to the simulator's actuation bounds
    ///
    /// Values are clamped to `[0, 1]` first so boundary or slightly
    /// out-of-range samples still produce a valid actuation.
    pub fn to_actuation(&self) -> Action {
        let mut out = [0.0; ACTION_DIM];
        for (i, v) in self.0.iter().enumerate() {
            let unit = if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
            out[i] = unit * ACTUATION_SCALE[i] + ACTUATION_OFFSET[i];
        }
        Action(out)
    }
}

/// One step of experience collected under the current policy
///
/// `action` is the raw Beta sample (before rescaling) and `log_prob` its
/// log-probability under the policy that generated it.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation the action was chosen from
    pub state: Observation,

    /// Sampled action in `[0, 1]^3`
    pub action: Action,

    /// Log-probability of `action` at collection time
    pub log_prob: f64,

    /// Shaped reward summed over the repeated ticks
    pub reward: f64,

    /// Observation after the step
    pub next_state: Observation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuation_bounds() {
        let low = Action::new([0.0, 0.0, 0.0]).to_actuation();
        assert_eq!(low.as_array(), [-1.0, 0.0, 0.0]);

        let high = Action::new([1.0, 1.0, 1.0]).to_actuation();
        assert_eq!(high.as_array(), [1.0, 1.0, 1.0]);

        let mid = Action::new([0.5, 0.25, 0.75]).to_actuation();
        assert_eq!(mid.steering(), 0.0);
        assert_eq!(mid.gas(), 0.25);
        assert_eq!(mid.brake(), 0.75);
    }

    #[test]
    fn test_actuation_tolerates_degenerate_samples() {
        let action = Action::new([1.5, -0.2, f32::NAN]).to_actuation();
        assert_eq!(action.steering(), 1.0);
        assert_eq!(action.gas(), 0.0);
        assert_eq!(action.brake(), 0.5);
    }

    #[test]
    fn test_from_slice() {
        assert!(Action::from_slice(&[0.1, 0.2]).is_none());
        assert_eq!(Action::from_slice(&[0.1, 0.2, 0.3]), Some(Action::new([0.1, 0.2, 0.3])));
    }
}
