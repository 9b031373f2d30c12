//! # Frame Effects
//!
//! The image-processing steps of the rendition pipelines. Every effect is a
//! pure function of its parameters and input pixels.
//!
//! - **Blur**: 15x15 box blur for the Shorts background
//! - **Composite**: centered 0.7x overlay paste
//! - **Crop**: centered 9:16 window, rescaled to 1080x1920
//! - **Concat**: outro normalization and joining
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clipsmith::effects::{BorderMode, BoxBlur, FrameEffect};
//! use clipsmith::video::Frame;
//!
//! let blur = BoxBlur::new(15, BorderMode::Reflect101).unwrap();
//! let frame = Frame::new_filled(1920, 1080, [30, 60, 90]);
//! let background = blur.apply(&frame).unwrap();
//! ```

pub mod blur;
pub mod composite;
pub mod concat;
pub mod crop;
pub mod traits;

pub use blur::{BorderMode, BoxBlur};
pub use composite::Compositor;
pub use concat::{concatenate, Conform, JoinMode, RateConverter};
pub use crop::{crop_region, CropPolicy, VerticalReframe};
pub use traits::FrameEffect;
