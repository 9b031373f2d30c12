//! Streaming ffmpeg encoder.
//!
//! Frames are piped as packed RGB into an `ffmpeg` child that writes a
//! hidden `.partial` file next to the destination. The partial file is
//! renamed onto the destination only after ffmpeg exits successfully;
//! any failure, or dropping an unfinished encoder, kills the child and
//! removes the partial file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::{is_valid_bitrate, ToolsConfig};
use crate::error::{ClipsmithError, Result};
use crate::video::clip::Clip;
use crate::video::stderr::StderrTail;
use crate::video::types::{ClipInfo, Frame, RenderSpec};

/// Summary of a committed output file
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: usize,
    pub duration: f64,
    pub file_size: u64,
}

pub struct Encoder {
    path: PathBuf,
    partial_path: PathBuf,
    spec: RenderSpec,
    fps: f64,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: StderrTail,
    frames_written: usize,
}

impl Encoder {
    /// Start an encode of `spec.width`x`spec.height` frames at `info.fps`
    ///
    /// The container's exact rate (`info.rate`) is passed through when known.
    pub fn create<P: AsRef<Path>>(
        path: P,
        info: &ClipInfo,
        spec: &RenderSpec,
        tools: &ToolsConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_spec(&path, spec, info.fps)?;

        let partial_path = partial_path_for(&path)?;

        // Probe the destination before ffmpeg gets a chance to half-write it
        File::create(&partial_path).map_err(|e| {
            ClipsmithError::encode(path.display().to_string(), format!("cannot create output: {}", e))
        })?;

        let rate = info.rate.clone().unwrap_or_else(|| format_fps(info.fps));
        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel", "error",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-s", &format!("{}x{}", spec.width, spec.height),
                "-r", &rate,
                "-i", "pipe:0",
                "-an",
                "-c:v", &spec.codec,
                "-b:v", &spec.bitrate,
                "-pix_fmt", &spec.pixel_format,
                "-movflags", "+faststart",
                "-f", "mp4",
            ])
            .arg(&partial_path);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_file(&partial_path);
                return Err(ClipsmithError::encode(
                    path.display().to_string(),
                    format!("failed to spawn {}: {}", tools.ffmpeg, e),
                ));
            }
        };

        let stdin = child.stdin.take().map(BufWriter::new);
        let stderr = StderrTail::spawn(child.stderr.take());

        debug!("Encoding {}x{} @ {} ({}, {}) to {}",
               spec.width, spec.height, rate, spec.codec, spec.bitrate, path.display());

        let mut encoder = Self {
            path,
            partial_path,
            spec: spec.clone(),
            fps: info.fps,
            child: Some(child),
            stdin,
            stderr,
            frames_written: 0,
        };

        if encoder.stdin.is_none() {
            encoder.abort();
            return Err(encoder.error("ffmpeg stdin unavailable"));
        }

        Ok(encoder)
    }

    /// Encode an in-memory clip at its own rate and size
    pub fn encode_clip<P: AsRef<Path>>(
        path: P,
        clip: &Clip,
        spec: &RenderSpec,
        tools: &ToolsConfig,
    ) -> Result<EncodedVideo> {
        if clip.is_empty() {
            return Err(ClipsmithError::encode(path.as_ref().display().to_string(), "clip has no frames"));
        }

        let mut encoder = Self::create(path, clip.info(), spec, tools)?;
        for frame in clip.frames() {
            encoder.write_frame(frame)?;
        }
        encoder.finish()
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            let reason = format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(), frame.height(), self.spec.width, self.spec.height
            );
            self.abort();
            return Err(self.error(reason));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.error("encoder is already finalized"));
        };

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            let stderr = self.abort();
            return Err(self.error(format!("failed to write frame: {} {}", e, stderr)));
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Close the pipe, wait for ffmpeg and commit the output file
    pub fn finish(mut self) -> Result<EncodedVideo> {
        if self.frames_written == 0 {
            self.abort();
            return Err(self.error("zero-length input"));
        }

        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };

        let Some(mut child) = self.child.take() else {
            return Err(self.error("encoder is already finalized"));
        };

        let status = child.wait();
        let stderr = self.stderr.join();
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.remove_partial();
                return Err(self.error(format!("failed to wait for ffmpeg: {}", e)));
            }
        };

        if !status.success() || flushed.is_err() {
            self.remove_partial();
            return Err(self.error(format!("ffmpeg exited with {}: {}", status, stderr)));
        }

        if let Err(e) = std::fs::rename(&self.partial_path, &self.path) {
            self.remove_partial();
            return Err(self.error(format!("failed to commit output: {}", e)));
        }

        let file_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        let encoded = EncodedVideo {
            path: self.path.clone(),
            frame_count: self.frames_written,
            duration: self.frames_written as f64 / self.fps,
            file_size,
        };

        info!("Wrote {} ({} frames, {:.1} MB)",
              encoded.path.display(), encoded.frame_count, file_size as f64 / 1024.0 / 1024.0);
        Ok(encoded)
    }

    fn error<R: Into<String>>(&self, reason: R) -> ClipsmithError {
        ClipsmithError::encode(self.path.display().to_string(), reason)
    }

    /// Kill ffmpeg, drop the partial file and return whatever it printed
    fn abort(&mut self) -> String {
        self.stdin = None;

        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }

        self.remove_partial();
        self.stderr.join()
    }

    fn remove_partial(&self) {
        if self.partial_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.partial_path) {
                warn!("Failed to remove {}: {}", self.partial_path.display(), e);
            }
        }
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!("Dropping unfinished encoder for {}", self.path.display());
            self.abort();
        }
    }
}

fn validate_spec(path: &Path, spec: &RenderSpec, fps: f64) -> Result<()> {
    let fail = |reason: String| ClipsmithError::encode(path.display().to_string(), reason);

    if spec.codec.trim().is_empty() {
        return Err(fail("codec is empty".to_string()));
    }

    if !is_valid_bitrate(&spec.bitrate) {
        return Err(fail(format!("invalid bitrate {:?}", spec.bitrate)));
    }

    if spec.width == 0 || spec.height == 0 {
        return Err(fail("width/height must be non-zero".to_string()));
    }

    if spec.pixel_format == "yuv420p" && (spec.width % 2 != 0 || spec.height % 2 != 0) {
        return Err(fail(format!(
            "{}x{} is odd; yuv420p output needs even dimensions",
            spec.width, spec.height
        )));
    }

    if !(fps.is_finite() && fps > 0.0) {
        return Err(fail(format!("invalid frame rate {}", fps)));
    }

    Ok(())
}

fn partial_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ClipsmithError::encode(path.display().to_string(), "output path has no file name"))?;
    Ok(path.with_file_name(format!(".{}.partial", name)))
}

fn format_fps(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{:.6}", fps)
    }
}
