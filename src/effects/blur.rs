//! Box (mean) blur used to synthesize the Shorts background.
//!
//! Each output sample is the rounded mean of the `k x k` neighborhood around
//! it. The filter runs as two separable passes over running sums kept in
//! `u32`, with a single division at the end, so the result is identical to
//! the direct 2D mean.

use serde::{Deserialize, Serialize};

use crate::{
    config::BlurConfig,
    effects::FrameEffect,
    error::{ClipsmithError, Result},
    video::{Clip, Frame},
};

/// How samples outside the frame are synthesized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    /// `dcb|abcdefgh|gfe`: mirror without repeating the edge sample
    #[default]
    Reflect101,

    /// `aaa|abcdefgh|hhh`: repeat the edge sample
    Replicate,
}

impl BorderMode {
    /// Map a possibly out-of-range coordinate onto `0..len`
    pub fn resolve(self, index: i64, len: usize) -> usize {
        let len = len as i64;
        if len <= 1 {
            return 0;
        }

        match self {
            BorderMode::Replicate => index.clamp(0, len - 1) as usize,
            BorderMode::Reflect101 => {
                let period = 2 * (len - 1);
                let i = index.rem_euclid(period);
                (if i >= len { period - i } else { i }) as usize
            }
        }
    }
}

/// Square mean filter
#[derive(Debug, Clone)]
pub struct BoxBlur {
    kernel_size: u32,
    border: BorderMode,
}

impl BoxBlur {
    pub fn new(kernel_size: u32, border: BorderMode) -> Result<Self> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(ClipsmithError::generic(format!(
                "blur kernel size must be odd and positive, got {}",
                kernel_size
            )));
        }
        Ok(Self { kernel_size, border })
    }

    pub fn from_config(config: &BlurConfig) -> Result<Self> {
        Self::new(config.kernel_size, config.border)
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn border(&self) -> BorderMode {
        self.border
    }

    /// Blur one frame
    pub fn blur_frame(&self, frame: &Frame) -> Frame {
        if self.kernel_size == 1 {
            return frame.clone();
        }

        let (width, height) = frame.dimensions();
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 {
            return frame.clone();
        }

        let radius = (self.kernel_size / 2) as i64;
        let src = frame.as_raw();

        // Horizontal pass: per-pixel row sums, not yet divided
        let mut row_sums = vec![0u32; w * h * 3];
        for y in 0..h {
            let row = &src[y * w * 3..(y + 1) * w * 3];
            let out = &mut row_sums[y * w * 3..(y + 1) * w * 3];

            let mut acc = [0u32; 3];
            for dx in -radius..=radius {
                let sx = self.border.resolve(dx, w);
                for c in 0..3 {
                    acc[c] += row[sx * 3 + c] as u32;
                }
            }

            for x in 0..w {
                out[x * 3..x * 3 + 3].copy_from_slice(&acc);

                let enter = self.border.resolve(x as i64 + radius + 1, w);
                let leave = self.border.resolve(x as i64 - radius, w);
                for c in 0..3 {
                    acc[c] = acc[c] + row[enter * 3 + c] as u32 - row[leave * 3 + c] as u32;
                }
            }
        }

        // Vertical pass: running sum of whole rows
        let area = self.kernel_size * self.kernel_size;
        let stride = w * 3;
        let mut column_acc = vec![0u32; stride];
        for dy in -radius..=radius {
            let sy = self.border.resolve(dy, h);
            let row = &row_sums[sy * stride..(sy + 1) * stride];
            for (acc, &v) in column_acc.iter_mut().zip(row) {
                *acc += v;
            }
        }

        let mut out = vec![0u8; stride * h];
        for y in 0..h {
            let dst = &mut out[y * stride..(y + 1) * stride];
            for (d, &sum) in dst.iter_mut().zip(&column_acc) {
                *d = ((sum + area / 2) / area) as u8;
            }

            let enter = self.border.resolve(y as i64 + radius + 1, h);
            let leave = self.border.resolve(y as i64 - radius, h);
            let enter_row = &row_sums[enter * stride..(enter + 1) * stride];
            let leave_row = &row_sums[leave * stride..(leave + 1) * stride];
            for ((acc, &add), &sub) in column_acc.iter_mut().zip(enter_row).zip(leave_row) {
                *acc = *acc + add - sub;
            }
        }

        // Buffer length matches width*height*3 by construction
        Frame::from_rgb_bytes(width, height, out).unwrap_or_else(|| frame.clone())
    }

    /// Blur every frame of a clip; dimensions and frame count are preserved
    pub fn blur_clip(&self, clip: &Clip) -> Result<Clip> {
        self.apply_clip(clip)
    }
}

impl FrameEffect for BoxBlur {
    fn name(&self) -> &str {
        "box_blur"
    }

    fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        Ok((width, height))
    }

    fn apply(&self, frame: &Frame) -> Result<Frame> {
        Ok(self.blur_frame(frame))
    }
}
