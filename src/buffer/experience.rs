//! Fixed-capacity ring buffer of transitions

use anyhow::{Result, bail};
use tch::{Device, Tensor};

use super::{ACTION_DIM, Transition};
use crate::env::frame::batch_observations;

/// Preallocated ring of transitions collected under the current policy
///
/// # Example
///
/// ```rust,no_run
/// use thrust_racing::buffer::ExperienceBuffer;
/// # fn transition() -> thrust_racing::buffer::Transition { unimplemented!() }
///
/// let mut buffer = ExperienceBuffer::new(2000);
/// if buffer.store(transition()) {
///     // 2000 transitions are present: run a PPO update
/// }
/// ```
#[derive(Debug)]
pub struct ExperienceBuffer {
    /// Slot storage, `None` until first written
    slots: Box<[Option<Transition>]>,

    /// Next slot to write
    cursor: usize,

    /// Set once every slot has been written
    filled: bool,
}

/// Buffer contents as tensors, ready for a PPO update
#[derive(Debug)]
pub struct ExperienceBatch {
    /// States `[C, K, H, W]`
    pub states: Tensor,

    /// Raw Beta samples `[C, 3]`
    pub actions: Tensor,

    /// Log-probabilities at collection time `[C]`
    pub old_log_probs: Tensor,

    /// Rewards `[C]`
    pub rewards: Tensor,

    /// Next states `[C, K, H, W]`
    pub next_states: Tensor,
}

impl ExperienceBuffer {
    /// Create an empty buffer with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        Self { slots, cursor: 0, filled: false }
    }

    /// Write a transition at the cursor and advance it
    ///
    /// Returns `true` exactly when the cursor wraps back to slot 0, i.e. on
    /// the C-th, 2C-th, ... call. Writing past capacity overwrites the
    /// oldest slot; it is not an error.
    pub fn store(&mut self, transition: Transition) -> bool {
        self.slots[self.cursor] = Some(transition);
        self.cursor = (self.cursor + 1) % self.slots.len();
        if self.cursor == 0 {
            self.filled = true;
            true
        } else {
            false
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next `store` writes to
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of slots holding a transition
    pub fn len(&self) -> usize {
        if self.filled { self.slots.len() } else { self.cursor }
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether all C slots hold a transition
    pub fn is_full(&self) -> bool {
        self.filled
    }

    /// Transition in slot `index`, if written
    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Stored transitions in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Collect the full buffer into tensors on `device`
    ///
    /// Fails unless all C slots are present.
    pub fn to_batch(&self, device: Device) -> Result<ExperienceBatch> {
        if !self.filled {
            bail!(
                "PPO update needs a full buffer ({} of {} transitions present)",
                self.len(),
                self.capacity()
            );
        }

        let capacity = self.capacity();
        let mut actions = Vec::with_capacity(capacity * ACTION_DIM);
        let mut old_log_probs = Vec::with_capacity(capacity);
        let mut rewards = Vec::with_capacity(capacity);
        for t in self.iter() {
            actions.extend_from_slice(&t.action.as_array());
            old_log_probs.push(t.log_prob as f32);
            rewards.push(t.reward as f32);
        }

        Ok(ExperienceBatch {
            states: batch_observations(self.iter().map(|t| &t.state), device)?,
            actions: Tensor::from_slice(&actions)
                .view([capacity as i64, ACTION_DIM as i64])
                .to_device(device),
            old_log_probs: Tensor::from_slice(&old_log_probs).to_device(device),
            rewards: Tensor::from_slice(&rewards).to_device(device),
            next_states: batch_observations(self.iter().map(|t| &t.next_state), device)?,
        })
    }
}
