use std::path::Path;

use rayon::prelude::*;

use crate::config::ToolsConfig;
use crate::error::{ClipsmithError, Result};
use crate::video::source::FrameSource;
use crate::video::types::{ClipInfo, Frame};

/// A fully materialized clip: every frame in memory plus its metadata
///
/// Suited to short clips such as outros and to tests. Long sources go
/// through [`FrameSource`] and the streaming pipeline instead.
#[derive(Debug, Clone)]
pub struct Clip {
    info: ClipInfo,
    frames: Vec<Frame>,
}

impl Clip {
    /// Build a clip, checking that every frame matches `info`'s dimensions
    pub fn new(info: ClipInfo, frames: Vec<Frame>) -> Result<Self> {
        if !(info.fps.is_finite() && info.fps > 0.0) {
            return Err(ClipsmithError::generic(format!(
                "clip {} has invalid frame rate {}",
                info.source, info.fps
            )));
        }

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.dimensions() != info.dimensions())
        {
            return Err(ClipsmithError::generic(format!(
                "frame {} of {} is {}x{}, expected {}x{}",
                index, info.source, frame.width(), frame.height(), info.width, info.height
            )));
        }

        Ok(Self { info, frames })
    }

    /// Decode a whole file into memory; the decoder is released before returning
    pub fn open<P: AsRef<Path>>(path: P, tools: &ToolsConfig) -> Result<Self> {
        FrameSource::open(path, tools)?.into_clip()
    }

    pub fn info(&self) -> &ClipInfo {
        &self.info
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn fps(&self) -> f64 {
        self.info.fps
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Apply `op` to every frame in parallel, keeping frame order
    pub fn map_frames<F>(&self, width: u32, height: u32, op: F) -> Result<Clip>
    where
        F: Fn(&Frame) -> Result<Frame> + Sync,
    {
        let frames = self
            .frames
            .par_iter()
            .map(|frame| op(frame))
            .collect::<Result<Vec<_>>>()?;

        Clip::new(self.info.with_dimensions(width, height), frames)
    }
}
