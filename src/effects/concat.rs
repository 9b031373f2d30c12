//! Appending an outro to a processed clip.
//!
//! The trailing clip is normalized to the leading clip before joining:
//! its frame rate by nearest-earlier frame selection, its size either by
//! stretching ([`JoinMode::Chain`]) or by fitting it centered on a black
//! canvas ([`JoinMode::Compose`]).

use tracing::debug;

use crate::{
    effects::{composite::paste, FrameEffect},
    error::{ClipsmithError, Result},
    video::{Clip, ClipInfo, Frame, Position, ResizeFilter},
};

/// How the trailing clip's frames are fitted to the leading clip's size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Stretch to the leading size
    Chain,
    /// Fit inside the leading canvas, preserving aspect, centered on black
    Compose,
}

/// Index of the source frame shown at output index `i` after converting
/// `src_fps` to `dst_fps`
pub fn source_index(i: usize, src_fps: f64, dst_fps: f64) -> usize {
    ((i as f64) * src_fps / dst_fps + 1e-9).floor() as usize
}

/// Rate-normalize an in-memory frame list
pub fn resample_rate(frames: &[Frame], src_fps: f64, dst_fps: f64) -> Vec<&Frame> {
    (0..)
        .map(|i| source_index(i, src_fps, dst_fps))
        .take_while(|&idx| idx < frames.len())
        .map(|idx| &frames[idx])
        .collect()
}

/// Lazy rate conversion over a forward-only frame stream
pub struct RateConverter<I> {
    inner: I,
    src_fps: f64,
    dst_fps: f64,
    emitted: usize,
    current: Option<(usize, Frame)>,
    next_src: usize,
    done: bool,
}

impl<I> RateConverter<I>
where
    I: Iterator<Item = Result<Frame>>,
{
    pub fn new(inner: I, src_fps: f64, dst_fps: f64) -> Self {
        Self {
            inner,
            src_fps,
            dst_fps,
            emitted: 0,
            current: None,
            next_src: 0,
            done: false,
        }
    }
}

impl<I> Iterator for RateConverter<I>
where
    I: Iterator<Item = Result<Frame>>,
{
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let target = source_index(self.emitted, self.src_fps, self.dst_fps);

        // Skip forward until the source frame at `target` is in hand
        while self.current.as_ref().map_or(true, |(idx, _)| *idx < target) {
            match self.inner.next() {
                Some(Ok(frame)) => {
                    self.current = Some((self.next_src, frame));
                    self.next_src += 1;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }

        self.emitted += 1;

        // Hand the frame over when no later output repeats it
        let next_target = source_index(self.emitted, self.src_fps, self.dst_fps);
        match &self.current {
            Some((idx, _)) if next_target > *idx => self.current.take().map(|(_, frame)| Ok(frame)),
            Some((_, frame)) => Some(Ok(frame.clone())),
            None => None,
        }
    }
}

/// Per-frame size normalization of a trailing clip onto a leading canvas
#[derive(Debug, Clone)]
pub struct Conform {
    width: u32,
    height: u32,
    mode: JoinMode,
    filter: ResizeFilter,
}

impl Conform {
    pub fn new(width: u32, height: u32, mode: JoinMode, filter: ResizeFilter) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ClipsmithError::incompatible(format!(
                "leading clip has zero-sized frames ({}x{})",
                width, height
            )));
        }
        Ok(Self { width, height, mode, filter })
    }

    /// Size the trailing frames are scaled to before being placed on the canvas
    fn fitted_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(ClipsmithError::incompatible(format!(
                "trailing clip has zero-sized frames ({}x{})",
                width, height
            )));
        }

        match self.mode {
            JoinMode::Chain => Ok((self.width, self.height)),
            JoinMode::Compose => {
                let scale = (self.width as f64 / width as f64).min(self.height as f64 / height as f64);
                let fw = (width as f64 * scale).round() as u32;
                let fh = (height as f64 * scale).round() as u32;
                if fw == 0 || fh == 0 {
                    return Err(ClipsmithError::incompatible(format!(
                        "{}x{} cannot be fitted into {}x{}",
                        width, height, self.width, self.height
                    )));
                }
                Ok((fw.min(self.width), fh.min(self.height)))
            }
        }
    }
}

impl FrameEffect for Conform {
    fn name(&self) -> &str {
        "conform"
    }

    fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        self.fitted_size(width, height)?;
        Ok((self.width, self.height))
    }

    fn apply(&self, frame: &Frame) -> Result<Frame> {
        let (fw, fh) = self.fitted_size(frame.width(), frame.height())?;
        let scaled = frame.resized(fw, fh, self.filter);

        if (fw, fh) == (self.width, self.height) {
            return Ok(scaled);
        }

        let canvas = Frame::new_black(self.width, self.height);
        let position = Position::new(
            ((self.width - fw) / 2) as i64,
            ((self.height - fh) / 2) as i64,
        );
        Ok(paste(&canvas, &scaled, position))
    }
}

fn check_rate(info: &ClipInfo) -> Result<()> {
    if !(info.fps.is_finite() && info.fps > 0.0) {
        return Err(ClipsmithError::incompatible(format!(
            "{} has invalid frame rate {}",
            info.source, info.fps
        )));
    }
    Ok(())
}

/// Normalize `tail` to `lead`'s rate and size without joining
pub fn conform_clip(lead: &ClipInfo, tail: &Clip, mode: JoinMode, filter: ResizeFilter) -> Result<Clip> {
    check_rate(lead)?;
    check_rate(tail.info())?;

    let conform = Conform::new(lead.width, lead.height, mode, filter)?;
    conform.output_size(tail.width(), tail.height())?;

    let frames: Vec<Frame> = resample_rate(tail.frames(), tail.fps(), lead.fps)
        .into_iter()
        .cloned()
        .collect();
    let retimed = Clip::new(ClipInfo { fps: lead.fps, rate: lead.rate.clone(), ..tail.info().clone() }, frames)?;

    conform.apply_clip(&retimed)
}

/// `lead`'s frames unchanged, then `tail`'s frames normalized to `lead`
pub fn concatenate(lead: &Clip, tail: &Clip, mode: JoinMode, filter: ResizeFilter) -> Result<Clip> {
    let conformed = conform_clip(lead.info(), tail, mode, filter)?;

    debug!("Joining {} frames of {} with {} frames of {}",
           lead.len(), lead.info().source, conformed.len(), tail.info().source);

    let mut frames = Vec::with_capacity(lead.len() + conformed.len());
    frames.extend_from_slice(lead.frames());
    frames.extend(conformed.into_frames());

    Clip::new(lead.info().clone(), frames)
}
