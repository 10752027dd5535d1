//! Frames and model input tensors.
//!
//! - `RgbFrame`: packed RGB24 pixels supplied by the capture collaborator.
//! - `InputTensor`: NCHW `[1, 3, S, S]` float tensor handed to an inference backend.
//!
//! Frames are borrowed for tensor construction and never retained by the kernel.

use anyhow::{anyhow, Result};

/// Packed RGB24 frame. Rows are top to bottom, no padding.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbFrame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Uniform frame of a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = expected_rgb_len(width, height)?;
        let pixels = rgb.iter().copied().cycle().take(len).collect();
        Self::new(pixels, width, height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Square NCHW float tensor with batch size 1.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    pub size: u32,
    data: Vec<f32>,
}

impl InputTensor {
    pub fn zeros(size: u32) -> Self {
        let side = size as usize;
        Self {
            size,
            data: vec![0.0; 3 * side * side],
        }
    }

    /// Shape as `[batch, channels, height, width]`.
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.size as usize, self.size as usize]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Resizes a frame to `size x size` (nearest neighbour) and lays it out as NCHW
/// floats in 0..1.
pub fn tensor_from_image(frame: &RgbFrame, size: u32) -> Result<InputTensor> {
    if size == 0 {
        return Err(anyhow!("tensor size must be > 0"));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!(
            "frame has empty dimensions {}x{}",
            frame.width,
            frame.height
        ));
    }

    let side = size as usize;
    let plane = side * side;
    let src_w = frame.width as usize;
    let src_h = frame.height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for y in 0..side {
        let sy = (y * src_h) / side;
        for x in 0..side {
            let sx = (x * src_w) / side;
            let src = (sy * src_w + sx) * 3;
            let dst = y * side + x;
            for channel in 0..3 {
                data[channel * plane + dst] = frame.pixels[src + channel] as f32 / 255.0;
            }
        }
    }

    Ok(InputTensor { size, data })
}

fn expected_rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
