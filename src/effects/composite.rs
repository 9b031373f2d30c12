use image::imageops;
use tracing::debug;

use crate::{
    effects::concat::resample_rate,
    error::{ClipsmithError, GeometryError, Result},
    video::{Clip, Frame, Position, ResizeFilter},
};

/// Pastes a scaled copy of an overlay, centered, over a background
#[derive(Debug, Clone)]
pub struct Compositor {
    scale: f32,
    filter: ResizeFilter,
}

impl Compositor {
    pub fn new(scale: f32, filter: ResizeFilter) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ClipsmithError::generic(format!("overlay scale must be positive, got {}", scale)));
        }
        Ok(Self { scale, filter })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Size of the overlay after scaling; each side is floored and at least 1
    pub fn overlay_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = |v: u32| ((v as f64 * self.scale as f64).floor() as u32).max(1);
        (scaled(width), scaled(height))
    }

    /// Top-left offset that centers an `overlay` rectangle on a `background` one
    pub fn position(background: (u32, u32), overlay: (u32, u32)) -> Position {
        let x = (background.0 as i64 - overlay.0 as i64).div_euclid(2);
        let y = (background.1 as i64 - overlay.1 as i64).div_euclid(2);
        Position::new(x, y)
    }

    /// Scale the overlay to its final size
    pub fn scale_overlay(&self, overlay: &Frame) -> Frame {
        let (w, h) = self.overlay_size(overlay.width(), overlay.height());
        overlay.resized(w, h, self.filter)
    }

    /// Scale `overlay` and paste it centered over `background`
    pub fn composite_frame(&self, background: &Frame, overlay: &Frame) -> Frame {
        let scaled = self.scale_overlay(overlay);
        let position = Self::position(background.dimensions(), scaled.dimensions());
        paste(background, &scaled, position)
    }

    /// Composite two clips frame by frame
    ///
    /// The overlay is rate-normalized to the background first; afterwards the
    /// frame counts must match. The result has the background's rate,
    /// dimensions and frame count.
    pub fn composite(&self, background: &Clip, overlay: &Clip) -> Result<Clip> {
        let overlay_frames: Vec<&Frame> = if (overlay.fps() - background.fps()).abs() > f64::EPSILON {
            resample_rate(overlay.frames(), overlay.fps(), background.fps())
        } else {
            overlay.frames().iter().collect()
        };

        if overlay_frames.len() != background.len() {
            return Err(GeometryError::DimensionMismatch {
                background: background.len(),
                overlay: overlay_frames.len(),
            }.into());
        }

        let (ow, oh) = self.overlay_size(overlay.width(), overlay.height());
        debug!("Compositing {}x{} overlay at {:?} on {}x{} background",
               ow, oh,
               Self::position((background.width(), background.height()), (ow, oh)),
               background.width(), background.height());

        use rayon::prelude::*;
        let frames = background
            .frames()
            .par_iter()
            .zip(overlay_frames.par_iter())
            .map(|(bg, ov)| self.composite_frame(bg, ov))
            .collect();

        Clip::new(background.info().clone(), frames)
    }
}

/// Opaque paste of `top` onto `base` at `position`, clipped to `base`
pub fn paste(base: &Frame, top: &Frame, position: Position) -> Frame {
    let mut canvas = base.as_image().clone();
    imageops::replace(&mut canvas, top.as_image(), position.x, position.y);
    Frame::new(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::ClipInfo;

    fn clip(width: u32, height: u32, count: usize, color: [u8; 3]) -> Clip {
        let info = ClipInfo::new("test", 30.0, width, height);
        Clip::new(info, vec![Frame::new_filled(width, height, color); count]).unwrap()
    }

    #[test]
    fn test_overlay_size_floors() {
        let compositor = Compositor::new(0.7, ResizeFilter::Bilinear).unwrap();
        assert_eq!(compositor.overlay_size(1920, 1080), (1344, 756));
        assert_eq!(compositor.overlay_size(100, 100), (70, 70));
        assert_eq!(compositor.overlay_size(1, 1), (1, 1));
        assert_eq!(compositor.scale(), 0.7);
    }

    #[test]
    fn test_position_is_centered() {
        assert_eq!(Compositor::position((100, 100), (70, 70)), Position::new(15, 15));
        assert_eq!(Compositor::position((1920, 1080), (1344, 756)), Position::new(288, 162));
        // Larger overlays hang off both sides evenly
        assert_eq!(Compositor::position((10, 10), (20, 20)), Position::new(-5, -5));
    }

    #[test]
    fn test_composite_frame_pastes_centered() {
        let compositor = Compositor::new(0.7, ResizeFilter::Nearest).unwrap();
        let bg = Frame::new_filled(100, 100, [0, 0, 255]);
        let ov = Frame::new_filled(100, 100, [255, 0, 0]);

        let out = compositor.composite_frame(&bg, &ov);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(14, 14), [0, 0, 255]);
        assert_eq!(out.get_pixel(15, 15), [255, 0, 0]);
        assert_eq!(out.get_pixel(84, 84), [255, 0, 0]);
        assert_eq!(out.get_pixel(85, 85), [0, 0, 255]);
    }

    #[test]
    fn test_composite_clip_frame_count() {
        let compositor = Compositor::new(0.7, ResizeFilter::Bilinear).unwrap();
        let out = compositor
            .composite(&clip(64, 36, 5, [0, 0, 0]), &clip(64, 36, 5, [200, 200, 200]))
            .unwrap();

        assert_eq!(out.len(), 5);
        assert_eq!(out.info().dimensions(), (64, 36));
        assert_eq!(out.fps(), 30.0);
    }

    #[test]
    fn test_composite_count_mismatch() {
        let compositor = Compositor::new(0.7, ResizeFilter::Bilinear).unwrap();
        let err = compositor
            .composite(&clip(64, 36, 5, [0, 0, 0]), &clip(64, 36, 4, [0, 0, 0]))
            .unwrap_err();

        assert!(matches!(
            err,
            ClipsmithError::Geometry(GeometryError::DimensionMismatch { background: 5, overlay: 4 })
        ));
    }

    #[test]
    fn test_composite_normalizes_overlay_rate() {
        let compositor = Compositor::new(0.5, ResizeFilter::Bilinear).unwrap();
        let background = clip(32, 32, 6, [0, 0, 0]);
        let info = ClipInfo::new("overlay", 15.0, 32, 32);
        let overlay = Clip::new(info, vec![Frame::new_filled(32, 32, [9, 9, 9]); 3]).unwrap();

        assert_eq!(compositor.composite(&background, &overlay).unwrap().len(), 6);
    }
}
