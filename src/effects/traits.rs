use tracing::debug;

use crate::{
    error::Result,
    video::{Clip, Frame},
};

/// A per-frame transformation used by the rendition pipelines
///
/// Effects are pure: the output frame depends only on the input frame and
/// the effect's own parameters, so frames can be processed in any order and
/// on any thread.
pub trait FrameEffect: Send + Sync {
    /// Returns the unique name of this effect
    fn name(&self) -> &str;

    /// Dimensions of the frames this effect produces for a `width`x`height` input
    ///
    /// Fails when the effect cannot be applied to that geometry at all.
    fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)>;

    /// Transform one frame
    fn apply(&self, frame: &Frame) -> Result<Frame>;

    /// Transform every frame of `clip` in parallel
    fn apply_clip(&self, clip: &Clip) -> Result<Clip> {
        let (width, height) = self.output_size(clip.width(), clip.height())?;
        debug!("Applying {} to {} frames of {}: {}x{} -> {}x{}",
               self.name(), clip.len(), clip.info().source, clip.width(), clip.height(), width, height);
        clip.map_frames(width, height, |frame| self.apply(frame))
    }
}
