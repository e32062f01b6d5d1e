//! Experience storage for PPO training
//!
//! On-policy transitions are written into a preallocated ring of fixed
//! capacity. The buffer signals when it has just been filled, which is the
//! only trigger for a PPO update; the next cycle then overwrites it from
//! slot 0.

pub mod experience;
pub mod transition;

pub use experience::{ExperienceBatch, ExperienceBuffer};
pub use transition::{ACTION_DIM, Action, Transition};
