use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::EncodingConfig;
use crate::error::{ClipsmithError, GeometryError, Result};

/// Represents a single decoded video frame
///
/// A thin wrapper around an RGB image buffer. Frames are never modified
/// after construction; every processing step produces a new frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self { buffer: ImageBuffer::new(width, height) }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::from_fn(width, height, |_, _| color)
    }

    /// Create a frame by evaluating `f` at every pixel
    pub fn from_fn<F: FnMut(u32, u32) -> [u8; 3]>(width: u32, height: u32, mut f: F) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgb(f(x, y)));
        Self { buffer }
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self { buffer })
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes, row-major
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Rescale to exactly `width`x`height`
    pub fn resized(&self, width: u32, height: u32, filter: ResizeFilter) -> Frame {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Frame::new(image::imageops::resize(&self.buffer, width, height, filter.into()))
    }

    /// Copy out the pixels inside `region`
    pub fn cropped(&self, region: &Region) -> Frame {
        let view = image::imageops::crop_imm(
            &self.buffer,
            region.x1,
            region.y1,
            region.width(),
            region.height(),
        );
        Frame::new(view.to_image())
    }
}

/// Metadata shared by every frame of a clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    /// Where the frames came from (file path or a synthetic label)
    pub source: String,

    /// Frames per second, always > 0
    pub fps: f64,

    pub width: u32,
    pub height: u32,

    /// Exact rate as the container reports it ("30000/1001"), when known
    pub rate: Option<String>,
}

impl ClipInfo {
    pub fn new<S: Into<String>>(source: S, fps: f64, width: u32, height: u32) -> Self {
        Self { source: source.into(), fps, width, height, rate: None }
    }

    /// Attach the container's rational frame rate
    pub fn with_rate<R: Into<String>>(mut self, rate: R) -> Self {
        self.rate = Some(rate.into());
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Same clip identity with new pixel dimensions
    pub fn with_dimensions(&self, width: u32, height: u32) -> Self {
        Self { width, height, ..self.clone() }
    }

    /// Bytes in one packed RGB frame
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Offset of an overlay's top-left corner on a background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned crop rectangle, `x1 < x2` and `y1 < y2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Region {
    /// Build a region that is non-degenerate and fits inside a `bounds` frame
    pub fn within(x1: u32, y1: u32, x2: u32, y2: u32, bounds: (u32, u32)) -> Result<Self> {
        let (width, height) = bounds;
        let fail = |reason: String| -> ClipsmithError {
            GeometryError::InvalidCropRegion { width, height, reason }.into()
        };

        if x1 >= x2 || y1 >= y2 {
            return Err(fail(format!("degenerate region ({}, {}, {}, {})", x1, y1, x2, y2)));
        }

        if x2 > width || y2 > height {
            return Err(fail(format!("region ({}, {}, {}, {}) exceeds frame bounds", x1, y1, x2, y2)));
        }

        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Resampling filter used for every rescale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Immutable encoding target for one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSpec {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate: String,
    pub pixel_format: String,
}

impl RenderSpec {
    pub fn new(width: u32, height: u32, encoding: &EncodingConfig) -> Self {
        Self {
            width,
            height,
            codec: encoding.codec.clone(),
            bitrate: encoding.bitrate.clone(),
            pixel_format: encoding.pixel_format.clone(),
        }
    }
}
