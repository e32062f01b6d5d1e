//! Deterministic scripted simulator
//!
//! Stands in for the real racing simulator in tests and demos. Frames are a
//! solid color with a dark stripe that moves a few pixels per tick, rewards
//! follow a fixed schedule, and termination happens after a fixed number of
//! ticks. Nothing depends on the actions received.

use anyhow::Result;

use super::{RgbImage, SimStep, Simulator};
use crate::{
    buffer::Action,
    env::frame::{FRAME_HEIGHT, FRAME_WIDTH},
};

const STRIPE_COLOR: [u8; 3] = [20, 20, 20];
const STRIPE_WIDTH: usize = 4;

/// Behaviour of a [`ScriptedSimulator`]
#[derive(Debug, Clone)]
pub struct ScriptedConfig {
    /// Frame height
    pub height: usize,

    /// Frame width
    pub width: usize,

    /// Background color
    pub color: [u8; 3],

    /// Draw a moving vertical stripe so consecutive frames differ
    pub stripe: bool,

    /// Reward schedule indexed by episode tick, cycled when exhausted
    pub rewards: Vec<f64>,

    /// Report a terminal state from this episode tick on
    pub terminate_after: Option<usize>,
}

impl Default for ScriptedConfig {
    fn default() -> Self {
        Self {
            height: FRAME_HEIGHT,
            width: FRAME_WIDTH,
            color: [105, 105, 105],
            stripe: true,
            rewards: vec![0.1],
            terminate_after: None,
        }
    }
}

impl ScriptedConfig {
    /// Set the background color
    pub fn color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Enable or disable the moving stripe
    pub fn stripe(mut self, stripe: bool) -> Self {
        self.stripe = stripe;
        self
    }

    /// Set the reward schedule
    pub fn rewards(mut self, rewards: Vec<f64>) -> Self {
        self.rewards = rewards;
        self
    }

    /// Terminate after `ticks` ticks of an episode
    pub fn terminate_after(mut self, ticks: usize) -> Self {
        self.terminate_after = Some(ticks);
        self
    }

    /// Set the frame size
    pub fn size(mut self, height: usize, width: usize) -> Self {
        self.height = height;
        self.width = width;
        self
    }
}

/// Simulator replaying a fixed script
#[derive(Debug, Clone)]
pub struct ScriptedSimulator {
    config: ScriptedConfig,
    ticks: usize,
    episodes: usize,
    renders: usize,
}

impl ScriptedSimulator {
    /// Create a simulator from a script
    pub fn new(config: ScriptedConfig) -> Self {
        Self { config, ticks: 0, episodes: 0, renders: 0 }
    }

    /// Frame shown after `tick` ticks of an episode
    pub fn frame_at(config: &ScriptedConfig, tick: usize) -> RgbImage {
        let mut image = RgbImage::filled(config.height, config.width, config.color);
        if config.stripe && config.width > 0 {
            let start = (tick * STRIPE_WIDTH) % config.width;
            for row in 0..config.height {
                for col in start..(start + STRIPE_WIDTH).min(config.width) {
                    image.set_pixel(row, col, STRIPE_COLOR);
                }
            }
        }
        image
    }

    /// Ticks taken in the current episode
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Number of `reset()` calls so far
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Number of `render()` calls so far
    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl Simulator for ScriptedSimulator {
    fn reset(&mut self) -> Result<RgbImage> {
        self.ticks = 0;
        self.episodes += 1;
        Ok(Self::frame_at(&self.config, 0))
    }

    fn step(&mut self, _action: &Action) -> Result<SimStep> {
        let reward = match self.config.rewards.len() {
            0 => 0.0,
            n => self.config.rewards[self.ticks % n],
        };
        self.ticks += 1;

        let terminated = self.config.terminate_after.is_some_and(|limit| self.ticks >= limit);
        Ok(SimStep { image: Self::frame_at(&self.config, self.ticks), reward, terminated })
    }

    fn render(&mut self) -> Result<()> {
        self.renders += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_deterministic_and_move() {
        let config = ScriptedConfig::default();
        assert_eq!(ScriptedSimulator::frame_at(&config, 3), ScriptedSimulator::frame_at(&config, 3));
        assert_ne!(ScriptedSimulator::frame_at(&config, 0), ScriptedSimulator::frame_at(&config, 1));
    }

    #[test]
    fn test_reward_schedule_cycles() -> Result<()> {
        let mut sim = ScriptedSimulator::new(ScriptedConfig::default().rewards(vec![1.0, 2.0]));
        sim.reset()?;
        let idle = Action::new([0.0; 3]);
        let rewards: Vec<f64> =
            (0..5).map(|_| sim.step(&idle).map(|s| s.reward)).collect::<Result<_>>()?;
        assert_eq!(rewards, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_terminates_after_limit() -> Result<()> {
        let mut sim = ScriptedSimulator::new(ScriptedConfig::default().terminate_after(2));
        sim.reset()?;
        let idle = Action::new([0.0; 3]);
        assert!(!sim.step(&idle)?.terminated);
        assert!(sim.step(&idle)?.terminated);

        sim.reset()?;
        assert!(!sim.step(&idle)?.terminated);
        assert_eq!(sim.episodes(), 2);
        Ok(())
    }
}
