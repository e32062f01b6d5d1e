//! Simulator boundary and environment wrappers
//!
//! The racing simulator itself is an external dependency. This module
//! defines the narrow interface it has to satisfy ([`Simulator`]) and the
//! wrappers that turn its raw frames into a learning signal.

use anyhow::{Result, bail};

use crate::buffer::Action;

pub mod car_racing;
pub mod frame;
pub mod reward_memory;
pub mod scripted;

pub use frame::{FrameStack, GrayFrame, Observation, to_gray};
pub use reward_memory::RewardMemory;

/// Core trait for the external racing simulator
///
/// Implementations only need to produce raw RGB frames; action repeat,
/// reward shaping and early termination live in
/// [`car_racing::CarRacingEnv`].
pub trait Simulator {
    /// Reset the simulator and return the first raw frame
    fn reset(&mut self) -> Result<RgbImage>;

    /// Advance one simulator tick with an actuation vector
    fn step(&mut self, action: &Action) -> Result<SimStep>;

    /// Display the current frame
    fn render(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Result of one raw simulator tick
#[derive(Debug, Clone)]
pub struct SimStep {
    /// Frame after the tick
    pub image: RgbImage,

    /// Raw reward for the tick
    pub reward: f64,

    /// Whether the simulator reached its own terminal state
    pub terminated: bool,
}

/// Raw color frame in row-major HWC layout
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Wrap an HWC byte buffer
    pub fn new(height: usize, width: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != height * width * 3 {
            bail!(
                "RGB buffer has {} bytes, expected {}x{}x3 = {}",
                data.len(),
                height,
                width,
                height * width * 3
            );
        }
        Ok(Self { height, width, data })
    }

    /// Image of a single solid color
    pub fn filled(height: usize, width: usize, rgb: [u8; 3]) -> Self {
        let data = rgb.iter().copied().cycle().take(height * width * 3).collect();
        Self { height, width, data }
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Raw HWC bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Iterate over `[r, g, b]` pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(3)
    }

    /// Overwrite one pixel
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [u8; 3]) {
        let offset = (row * self.width + col) * 3;
        self.data[offset..offset + 3].copy_from_slice(&rgb);
    }

    /// Mean intensity (0..255) of one channel
    pub fn channel_mean(&self, channel: usize) -> f64 {
        debug_assert!(channel < 3, "channel {} out of range", channel);
        let pixels = self.height * self.width;
        if pixels == 0 {
            return 0.0;
        }
        let sum: u64 = self.pixels().map(|px| px[channel] as u64).sum();
        sum as f64 / pixels as f64
    }
}
