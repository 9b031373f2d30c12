//! In-memory rendition pipelines over materialized clips.
//!
//! These mirror the streaming engine frame for frame and are what the unit
//! tests exercise; the batch path never holds a whole clip in memory.

use crate::{
    config::Config,
    effects::{concatenate, BoxBlur, Compositor, FrameEffect, JoinMode, VerticalReframe},
    error::Result,
    video::{Clip, Frame, Region, ResizeFilter},
};

/// Blurred background, sharp centered overlay, vertical reframe
#[derive(Debug, Clone)]
pub struct ShortsLayout {
    blur: BoxBlur,
    compositor: Compositor,
    reframe: VerticalReframe,
    filter: ResizeFilter,
}

impl ShortsLayout {
    pub fn new(blur: BoxBlur, compositor: Compositor, reframe: VerticalReframe, filter: ResizeFilter) -> Self {
        Self { blur, compositor, reframe, filter }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let shorts = &config.shorts;
        Ok(Self::new(
            BoxBlur::from_config(&config.blur)?,
            Compositor::new(shorts.overlay_scale, shorts.filter)?,
            VerticalReframe::from_config(shorts),
            shorts.filter,
        ))
    }

    /// Final frame size of the rendition
    pub fn output(&self) -> (u32, u32) {
        self.reframe.output()
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    /// Crop window for a `width`x`height` source
    pub fn region_for(&self, width: u32, height: u32) -> Result<Region> {
        self.reframe.region_for(width, height)
    }

    /// One output frame from a background/overlay pair of source frames
    pub fn render_frame(&self, background: &Frame, overlay: &Frame, region: &Region) -> Frame {
        let blurred = self.blur.blur_frame(background);
        let composited = self.compositor.composite_frame(&blurred, overlay);
        self.reframe.reframe(&composited, region)
    }

    /// Render a background/overlay pair of clips, before the outro
    pub fn render_pair(&self, background: &Clip, overlay: &Clip) -> Result<Clip> {
        let blurred = self.blur.blur_clip(background)?;
        let composited = self.compositor.composite(&blurred, overlay)?;
        self.reframe.apply_clip(&composited)
    }

    /// Render a single source used as both background and overlay
    pub fn render_clip(&self, source: &Clip) -> Result<Clip> {
        self.render_pair(source, source)
    }
}

/// Source unchanged, then the outro stretched to the source size and rate
pub fn twitter_clip(source: &Clip, outro: &Clip, filter: ResizeFilter) -> Result<Clip> {
    concatenate(source, outro, JoinMode::Chain, filter)
}

/// Shorts cut of `source`, then the outro fitted onto the vertical canvas
pub fn shorts_clip(source: &Clip, outro: &Clip, layout: &ShortsLayout) -> Result<Clip> {
    let vertical = layout.render_clip(source)?;
    concatenate(&vertical, outro, JoinMode::Compose, layout.filter())
}
