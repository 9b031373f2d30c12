//! Decoder-backed frame sequences.
//!
//! A [`FrameSource`] owns an `ffmpeg` child process that decodes one file to
//! packed RGB on stdout. Frames are read lazily, in order, exactly once; to
//! read them again, open the file again. Dropping the source kills and reaps
//! the child, so an early return or a failed step never leaks a decoder.

use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::error::{ClipsmithError, Result};
use crate::video::clip::Clip;
use crate::video::stderr::StderrTail;
use crate::video::types::{ClipInfo, Frame};

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// Parse an ffmpeg rational ("30000/1001") or plain number into fps
pub(crate) fn parse_frame_rate(raw: &str) -> Option<f64> {
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Read the first video stream's geometry and rate with ffprobe
pub fn probe<P: AsRef<Path>>(path: P, tools: &ToolsConfig) -> Result<ClipInfo> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    if !path.is_file() {
        return Err(ClipsmithError::open(path_str, "no such file"));
    }

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,avg_frame_rate,r_frame_rate:stream_side_data=rotation",
            "-of", "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ClipsmithError::open(&path_str, format!("failed to run {}: {}", tools.ffprobe, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClipsmithError::open(&path_str, format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_stream_info(&path_str, &output.stdout)
}

/// Build a [`ClipInfo`] from ffprobe's JSON description of the first stream
///
/// Dimensions are the coded ones. Display rotation is reported but not
/// applied; the decoder runs with `-noautorotate` so frames match them.
fn parse_stream_info(source: &str, json: &[u8]) -> Result<ClipInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ClipsmithError::open(source, format!("unreadable ffprobe output: {}", e)))?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ClipsmithError::open(source, "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ClipsmithError::open(source, "video stream has no dimensions")),
    };

    let (rate, fps) = [stream.avg_frame_rate, stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|raw| parse_frame_rate(&raw).map(|fps| (raw.trim().to_string(), fps)))
        .ok_or_else(|| ClipsmithError::open(source, "video stream has no usable frame rate"))?;

    if let Some(rotation) = stream.side_data_list.iter().filter_map(|d| d.rotation).find(|r| *r != 0.0) {
        debug!("{} carries a {} degree display rotation; decoding unrotated", source, rotation);
    }

    debug!("Probed {}: {}x{} @ {} ({:.3}fps)", source, width, height, rate, fps);
    Ok(ClipInfo::new(source, fps, width, height).with_rate(rate))
}

/// Forward-only, lazily decoded frame sequence backed by an ffmpeg process
pub struct FrameSource {
    info: ClipInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: StderrTail,
    frames_read: usize,
}

impl FrameSource {
    /// Probe `path` and start decoding it
    pub fn open<P: AsRef<Path>>(path: P, tools: &ToolsConfig) -> Result<Self> {
        let path = path.as_ref();
        let info = probe(path, tools)?;

        let mut child = Command::new(&tools.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClipsmithError::open(&info.source, format!("failed to spawn {}: {}", tools.ffmpeg, e)))?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ClipsmithError::open(&info.source, "ffmpeg stdout unavailable"));
            }
        };

        debug!("Opened decoder for {}", info.source);
        Ok(Self {
            info,
            stderr: StderrTail::spawn(child.stderr.take()),
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            frames_read: 0,
        })
    }

    pub fn info(&self) -> &ClipInfo {
        &self.info
    }

    /// Frames yielded so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Decode every remaining frame into memory, releasing the decoder
    pub fn into_clip(self) -> Result<Clip> {
        let info = self.info.clone();
        let frames = self.collect::<Result<Vec<_>>>()?;
        Clip::new(info, frames)
    }

    fn read_frame(&mut self) -> Option<Result<Frame>> {
        let stdout = self.stdout.as_mut()?;
        let mut buf = vec![0u8; self.info.frame_len()];

        match read_full(stdout, &mut buf) {
            Ok(0) => self.finish().map(Err),
            Ok(n) if n == buf.len() => {
                self.frames_read += 1;
                let frame = Frame::from_rgb_bytes(self.info.width, self.info.height, buf)?;
                Some(Ok(frame))
            }
            Ok(n) => {
                let reason = format!("truncated frame {} ({} of {} bytes)", self.frames_read, n, self.info.frame_len());
                let stderr = self.release();
                Some(Err(self.error(reason, &stderr)))
            }
            Err(e) => {
                let stderr = self.release();
                Some(Err(self.error(e.to_string(), &stderr)))
            }
        }
    }

    /// Reap the child after a clean EOF, surfacing a failed exit status
    fn finish(&mut self) -> Option<ClipsmithError> {
        self.stdout = None;
        let mut child = self.child.take()?;
        let status = child.wait();
        let stderr = self.stderr.join();
        debug!("Decoder for {} finished after {} frames", self.info.source, self.frames_read);

        match status {
            Ok(status) if status.success() => {
                if self.frames_read == 0 {
                    return Some(self.error("no frames decoded".to_string(), &stderr));
                }
                None
            }
            Ok(status) => Some(self.error(format!("ffmpeg exited with {}", status), &stderr)),
            Err(e) => Some(self.error(e.to_string(), &stderr)),
        }
    }

    fn error(&self, reason: String, stderr: &str) -> ClipsmithError {
        if stderr.is_empty() {
            ClipsmithError::decode(&self.info.source, reason)
        } else {
            ClipsmithError::decode(&self.info.source, format!("{}: {}", reason, stderr))
        }
    }

    /// Stop the child if it is still running; returns what it printed
    fn release(&mut self) -> String {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                if e.kind() != ErrorKind::InvalidInput {
                    warn!("Failed to stop decoder for {}: {}", self.info.source, e);
                }
            }
            let _ = child.wait();
        }
        self.stderr.join()
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fill `buf` unless EOF comes first; returns the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
