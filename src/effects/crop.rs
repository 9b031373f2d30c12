use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::ShortsConfig,
    effects::FrameEffect,
    error::{GeometryError, Result},
    video::{Frame, Region, ResizeFilter},
};

/// What to do when a derived crop dimension exceeds the source frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropPolicy {
    /// Shrink the offending dimension to the source size and recenter
    #[default]
    Clamp,
    /// Reject the source with `InvalidCropRegion`
    Fail,
}

/// Centered 9:16 crop window for a `width`x`height` frame
///
/// `crop_width` is derived from the height and `crop_height` from the
/// width: `floor(h * 9 / 16)` and `floor(w * 9 / 16)`.
pub fn crop_region(width: u32, height: u32, policy: CropPolicy) -> Result<Region> {
    let mut crop_width = (height as u64 * 9 / 16) as u32;
    let mut crop_height = (width as u64 * 9 / 16) as u32;

    if crop_width > width || crop_height > height {
        match policy {
            CropPolicy::Fail => {
                return Err(GeometryError::InvalidCropRegion {
                    width,
                    height,
                    reason: format!("{}x{} window does not fit", crop_width, crop_height),
                }.into());
            }
            CropPolicy::Clamp => {
                warn!("Clamping {}x{} crop window to {}x{} source", crop_width, crop_height, width, height);
                crop_width = crop_width.min(width);
                crop_height = crop_height.min(height);
            }
        }
    }

    let x1 = (width - crop_width) / 2;
    let y1 = (height - crop_height) / 2;
    Region::within(x1, y1, x1 + crop_width, y1 + crop_height, (width, height))
}

/// Crops frames to the centered 9:16 window and rescales to a fixed size
#[derive(Debug, Clone)]
pub struct VerticalReframe {
    output: (u32, u32),
    policy: CropPolicy,
    filter: ResizeFilter,
}

impl VerticalReframe {
    pub fn new(output: (u32, u32), policy: CropPolicy, filter: ResizeFilter) -> Self {
        Self { output, policy, filter }
    }

    pub fn from_config(config: &ShortsConfig) -> Self {
        Self::new((config.output_width, config.output_height), config.crop_policy, config.filter)
    }

    pub fn output(&self) -> (u32, u32) {
        self.output
    }

    pub fn region_for(&self, width: u32, height: u32) -> Result<Region> {
        crop_region(width, height, self.policy)
    }

    /// Crop with a region computed once per clip
    pub fn reframe(&self, frame: &Frame, region: &Region) -> Frame {
        let (w, h) = self.output;
        frame.cropped(region).resized(w, h, self.filter)
    }
}

impl FrameEffect for VerticalReframe {
    fn name(&self) -> &str {
        "vertical_reframe"
    }

    fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let region = self.region_for(width, height)?;
        debug!("9:16 window for {}x{}: {:?}", width, height, region);
        Ok(self.output)
    }

    fn apply(&self, frame: &Frame) -> Result<Frame> {
        let region = self.region_for(frame.width(), frame.height())?;
        Ok(self.reframe(frame, &region))
    }
}
