//! # Video Module
//!
//! Frames, clips, and the ffmpeg-backed decoder and encoder.

pub mod clip;
pub mod encoder;
pub mod source;
mod stderr;
pub mod types;

#[cfg(all(test, unix))]
pub(crate) mod fake_tools;

pub use clip::Clip;
pub use encoder::{EncodedVideo, Encoder};
pub use source::{probe, FrameSource};
pub use types::{ClipInfo, Frame, Position, Region, RenderSpec, ResizeFilter};
