//! Utility functions and helpers

pub mod running_score;

pub use running_score::RunningScore;
