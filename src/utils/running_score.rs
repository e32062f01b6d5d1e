//! Exponentially smoothed episode score

/// Running score `value = decay * value + (1 - decay) * score`
///
/// Starts at zero and is updated once per finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningScore {
    value: f64,
    decay: f64,
}

impl RunningScore {
    /// Create a running score starting at zero
    pub fn new(decay: f64) -> Self {
        Self { value: 0.0, decay }
    }

    /// Fold in one episode score and return the new value
    pub fn update(&mut self, score: f64) -> f64 {
        self.value = self.decay * self.value + (1.0 - self.decay) * score;
        self.value
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Smoothing factor
    pub fn decay(&self) -> f64 {
        self.decay
    }
}

impl Default for RunningScore {
    fn default() -> Self {
        Self::new(0.99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update() {
        let mut score = RunningScore::default();
        assert!((score.update(100.0) - 1.0).abs() < 1e-12);
        assert!((score.update(100.0) - 1.99).abs() < 1e-12);
    }

    #[test]
    fn test_converges_to_constant_score() {
        let mut score = RunningScore::new(0.9);
        for _ in 0..500 {
            score.update(50.0);
        }
        assert!((score.value() - 50.0).abs() < 1e-6);
    }
}
