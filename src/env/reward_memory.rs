//! Rolling reward history used for stagnation detection

/// Fixed-length circular history of recent step rewards
///
/// Starts zero-filled, so the mean only reflects real rewards once the
/// history has wrapped.
#[derive(Debug, Clone)]
pub struct RewardMemory {
    history: Vec<f64>,
    cursor: usize,
}

impl RewardMemory {
    /// Create a zeroed history of `len` rewards
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "reward memory length must be positive");
        Self { history: vec![0.0; len], cursor: 0 }
    }

    /// Record a reward and return the mean over the whole history
    pub fn record(&mut self, reward: f64) -> f64 {
        self.history[self.cursor] = reward;
        self.cursor = (self.cursor + 1) % self.history.len();
        self.mean()
    }

    /// Mean over the whole history
    pub fn mean(&self) -> f64 {
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// Zero the history for a new episode
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|r| *r = 0.0);
        self.cursor = 0;
    }

    /// History length
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Always false
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_includes_zero_padding() {
        let mut memory = RewardMemory::new(4);
        assert_eq!(memory.record(2.0), 0.5);
        assert_eq!(memory.record(2.0), 1.0);
    }

    #[test]
    fn test_wraps_and_overwrites_oldest() {
        let mut memory = RewardMemory::new(3);
        memory.record(3.0);
        memory.record(3.0);
        memory.record(3.0);
        assert_eq!(memory.mean(), 3.0);

        // Overwrites the first 3.0
        assert_eq!(memory.record(0.0), 2.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut memory = RewardMemory::new(2);
        memory.record(-5.0);
        memory.reset();
        assert_eq!(memory.mean(), 0.0);
        assert_eq!(memory.record(1.0), 0.5);
    }
}
