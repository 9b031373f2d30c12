//! # clipsmith
//!
//! Turn landscape videos into short-form social media renditions.
//!
//! Each source video produces two files:
//!
//! - **Twitter**: the source at its own size and rate, followed by an outro
//! - **YouTube Shorts**: a 1080x1920 cut with a blurred copy of the source
//!   filling the frame and a 0.7x sharp copy centered on top, followed by an
//!   outro
//!
//! Decoding and encoding go through `ffmpeg`/`ffprobe` subprocesses; all
//! pixel work happens in-process on [`video::Frame`] buffers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clipsmith::{
//!     batch::{BatchJob, BatchOrchestrator},
//!     config::Config,
//!     pipeline::RenditionEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = RenditionEngine::new(Config::default())?;
//! let job = BatchJob {
//!     input_dir: "videos/".into(),
//!     output_dir: "out/".into(),
//!     archive_dir: "archive/".into(),
//!     twitter_outro: "outros/twitter.mp4".into(),
//!     youtube_outro: "outros/youtube.mp4".into(),
//! };
//!
//! let report = BatchOrchestrator::new(engine, job).run().await?;
//! println!("{} files, {} failed renditions", report.total_files(), report.failed_renditions());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - frames, clips, the streaming decoder and encoder
//! - [`effects`] - blur, composite, crop and concatenation steps
//! - [`pipeline`] - per-format rendition pipelines
//! - [`batch`] - directory processing with a bounded worker pool
//! - [`config`] - configuration management

pub mod batch;
pub mod config;
pub mod effects;
pub mod error;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    batch::{BatchJob, BatchOrchestrator, BatchReport},
    config::Config,
    error::{ClipsmithError, Result},
    pipeline::{Format, RenditionEngine},
};
