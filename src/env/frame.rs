//! Frame preprocessing
//!
//! Raw RGB frames are collapsed to a single luminance channel and stacked
//! over time so the policy can infer motion from one observation.
//!
//! ```text
//! gray = 0.299 R + 0.587 G + 0.114 B
//! norm = gray / 128 - 1            (in [-1, 1))
//! ```

use std::{collections::VecDeque, sync::Arc};

use anyhow::{Result, bail};
use tch::{Device, Tensor};

use super::RgbImage;

/// Frame height the policy network expects
pub const FRAME_HEIGHT: usize = 96;

/// Frame width the policy network expects
pub const FRAME_WIDTH: usize = 96;

const LUMA: [f64; 3] = [0.299, 0.587, 0.114];

/// Single-channel frame
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl GrayFrame {
    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row-major pixel values
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Convert an RGB frame to grayscale
///
/// With `normalize` the output is rescaled via `value / 128 - 1`; otherwise
/// raw luminance in `0..=255` is returned. Pure and deterministic.
pub fn to_gray(rgb: &RgbImage, normalize: bool) -> GrayFrame {
    let data = rgb
        .pixels()
        .map(|px| {
            let gray = LUMA[0] * px[0] as f64 + LUMA[1] * px[1] as f64 + LUMA[2] * px[2] as f64;
            if normalize { (gray / 128.0 - 1.0) as f32 } else { gray as f32 }
        })
        .collect();

    GrayFrame { height: rgb.height(), width: rgb.width(), data }
}

/// Fixed-depth temporal stack of frames
///
/// Always holds exactly `depth` frames: pushing evicts the oldest one.
#[derive(Debug, Clone)]
pub struct FrameStack {
    depth: usize,
    frames: VecDeque<Arc<GrayFrame>>,
}

impl FrameStack {
    /// Build a stack holding `depth` copies of the first frame of an episode
    pub fn new(first: GrayFrame, depth: usize) -> Self {
        assert!(depth > 0, "frame stack depth must be positive");
        let first = Arc::new(first);
        let frames = std::iter::repeat_with(|| Arc::clone(&first)).take(depth).collect();
        Self { depth, frames }
    }

    /// Drop the oldest frame and append `frame`
    pub fn push_frame(&mut self, frame: GrayFrame) -> Result<()> {
        let newest = self.frames.back().map(|f| (f.height, f.width));
        if let Some((height, width)) = newest {
            if frame.height != height || frame.width != width {
                bail!(
                    "frame is {}x{}, stack holds {}x{} frames",
                    frame.height,
                    frame.width,
                    height,
                    width
                );
            }
        }

        self.frames.pop_front();
        self.frames.push_back(Arc::new(frame));
        debug_assert_eq!(self.frames.len(), self.depth);
        Ok(())
    }

    /// Configured depth K
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of frames currently held (always equal to the depth)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false: a stack is created full
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from oldest to newest
    pub fn frames(&self) -> impl Iterator<Item = &GrayFrame> {
        self.frames.iter().map(|f| f.as_ref())
    }

    /// Snapshot the stack as an immutable observation
    pub fn observation(&self) -> Observation {
        let (height, width) = (self.frames[0].height, self.frames[0].width);
        let mut data = Vec::with_capacity(self.depth * height * width);
        for frame in &self.frames {
            data.extend_from_slice(&frame.data);
        }
        Observation { depth: self.depth, height, width, data: data.into() }
    }
}

/// Stack of K normalized grayscale frames, laid out `[K, H, W]`
///
/// Cloning is cheap: the pixel data is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    depth: usize,
    height: usize,
    width: usize,
    data: Arc<[f32]>,
}

impl Observation {
    /// Wrap a flat `[K, H, W]` buffer
    pub fn from_vec(depth: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != depth * height * width {
            bail!(
                "observation has {} values, expected {}x{}x{}",
                data.len(),
                depth,
                height,
                width
            );
        }
        Ok(Self { depth, height, width, data: data.into() })
    }

    /// `(depth, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.depth, self.height, self.width)
    }

    /// Flat pixel values
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Batch-of-one tensor `[1, K, H, W]`
    pub fn to_tensor(&self, device: Device) -> Tensor {
        Tensor::from_slice(&self.data)
            .view([1, self.depth as i64, self.height as i64, self.width as i64])
            .to_device(device)
    }
}

/// Stack observations into a `[N, K, H, W]` tensor
pub fn batch_observations<'a, I>(observations: I, device: Device) -> Result<Tensor>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut shape = None;
    let mut count = 0i64;
    let mut data = Vec::new();

    for obs in observations {
        match shape {
            None => shape = Some(obs.shape()),
            Some(s) if s != obs.shape() => {
                bail!("observation shape {:?} does not match batch shape {:?}", obs.shape(), s)
            }
            Some(_) => {}
        }
        data.extend_from_slice(obs.as_slice());
        count += 1;
    }

    let Some((depth, height, width)) = shape else {
        bail!("cannot batch zero observations");
    };

    Ok(Tensor::from_slice(&data)
        .view([count, depth as i64, height as i64, width as i64])
        .to_device(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> RgbImage {
        let data = (0..4 * 4 * 3).map(|i| (i * 5) as u8).collect();
        RgbImage::new(4, 4, data).unwrap()
    }

    #[test]
    fn test_gray_normalized_range() {
        for rgb in [[0, 0, 0], [255, 255, 255], [255, 0, 0], [0, 255, 0], [12, 200, 99]] {
            let frame = to_gray(&RgbImage::filled(3, 3, rgb), true);
            for &v in frame.as_slice() {
                assert!((-1.0..=1.0).contains(&v), "value {} out of range for {:?}", v, rgb);
            }
        }
    }

    #[test]
    fn test_gray_luminance_weights() {
        let frame = to_gray(&RgbImage::filled(1, 1, [100, 50, 200]), false);
        let expected = 0.299 * 100.0 + 0.587 * 50.0 + 0.114 * 200.0;
        assert!((frame.as_slice()[0] as f64 - expected).abs() < 1e-4);

        let black = to_gray(&RgbImage::filled(1, 1, [0, 0, 0]), true);
        assert_eq!(black.as_slice()[0], -1.0);
    }

    #[test]
    fn test_gray_deterministic() {
        let image = gradient_image();
        let a = to_gray(&image, true);
        let b = to_gray(&image, true);
        let bits_a: Vec<u32> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_stack_starts_with_copies() {
        let first = to_gray(&gradient_image(), true);
        let stack = FrameStack::new(first.clone(), 4);

        assert_eq!(stack.len(), 4);
        for frame in stack.frames() {
            assert_eq!(frame, &first);
        }
    }

    #[test]
    fn test_push_frame_keeps_depth_and_order() {
        let first = to_gray(&RgbImage::filled(2, 2, [0, 0, 0]), true);
        let mut stack = FrameStack::new(first, 3);

        for level in 1..=5u8 {
            let frame = to_gray(&RgbImage::filled(2, 2, [level * 40; 3]), true);
            stack.push_frame(frame.clone()).unwrap();
            assert_eq!(stack.len(), 3);
            assert_eq!(stack.frames().last().unwrap(), &frame);
        }

        let obs = stack.observation();
        assert_eq!(obs.shape(), (3, 2, 2));
        // Oldest surviving frame is level 3
        let expected = to_gray(&RgbImage::filled(2, 2, [120; 3]), true);
        assert_eq!(&obs.as_slice()[..4], expected.as_slice());
    }

    #[test]
    fn test_push_frame_rejects_shape_change() {
        let first = to_gray(&RgbImage::filled(2, 2, [0, 0, 0]), true);
        let mut stack = FrameStack::new(first, 2);
        let wrong = to_gray(&RgbImage::filled(3, 2, [0, 0, 0]), true);
        assert!(stack.push_frame(wrong).is_err());
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_batch_observations_shape() {
        let stack = FrameStack::new(to_gray(&gradient_image(), true), 2);
        let obs = stack.observation();
        let batch = batch_observations([&obs, &obs, &obs], Device::Cpu).unwrap();
        assert_eq!(batch.size(), vec![3, 2, 4, 4]);
    }
}
