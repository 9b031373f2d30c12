//! # Rendition Pipelines
//!
//! Turns one source video plus an outro into a finished output file for a
//! target [`Format`]. [`RenditionEngine`] streams frames from decoders to
//! the encoder; [`layout`] holds the same pipelines over in-memory clips.

pub mod engine;
pub mod format;
pub mod layout;

pub use engine::{FramePairs, RenditionEngine};
pub use format::{sanitize_file_name, Format};
pub use layout::{shorts_clip, twitter_clip, ShortsLayout};
