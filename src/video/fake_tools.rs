//! Shell-script stand-ins for ffmpeg and ffprobe.
//!
//! A fake "video" is a file holding the JSON ffprobe would print for it,
//! plus a `<name>.raw` sidecar with the packed RGB frames the decoder
//! emits. The fake ffmpeg appends its arguments to `<script>.args`.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::video::types::Frame;

/// Prints the file named by its last argument
const FFPROBE: &str = r#"for arg in "$@"; do last="$arg"; done
exec cat "$last""#;

/// Sets `$input` (the argument after `-i`) and `$last` (the output path)
const FFMPEG_ARGS: &str = r#"prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  prev="$arg"
  last="$arg"
done
echo "$@" >> "$0.args""#;

/// Decodes `<input>.raw`, encodes by copying stdin to the output path
pub(crate) const PASSTHROUGH: &str = r#"if [ "$input" = "pipe:0" ]; then
  exec cat > "$last"
fi
exec cat "$input.raw""#;

pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Install both tools under `dir/bin`; `ffmpeg_body` runs after argument parsing
pub(crate) fn install(dir: &Path, ffmpeg_body: &str) -> ToolsConfig {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let ffmpeg = write_script(&bin, "ffmpeg", &format!("{}\n{}", FFMPEG_ARGS, ffmpeg_body));
    let ffprobe = write_script(&bin, "ffprobe", FFPROBE);
    ToolsConfig {
        ffmpeg: ffmpeg.display().to_string(),
        ffprobe: ffprobe.display().to_string(),
    }
}

/// Every ffmpeg command line seen so far, one per line
pub(crate) fn logged_args(tools: &ToolsConfig) -> String {
    std::fs::read_to_string(format!("{}.args", tools.ffmpeg)).unwrap_or_default()
}

pub(crate) fn stream_json(width: u32, height: u32, rate: &str) -> String {
    format!(
        r#"{{"streams":[{{"width":{},"height":{},"avg_frame_rate":"{}","r_frame_rate":"{}"}}]}}"#,
        width, height, rate, rate
    )
}

pub(crate) fn raw_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.raw", path.display()))
}

pub(crate) fn raw_bytes(frames: &[Frame]) -> Vec<u8> {
    frames.iter().flat_map(|f| f.as_raw().iter().copied()).collect()
}

/// Write a fake video at `path` whose decoder yields `frames`
pub(crate) fn write_video(path: &Path, rate: &str, frames: &[Frame]) {
    let (width, height) = frames.first().map_or((2, 2), Frame::dimensions);
    std::fs::write(path, stream_json(width, height, rate)).unwrap();
    std::fs::write(raw_path(path), raw_bytes(frames)).unwrap();
}

/// `count` frames of `width`x`height` that differ from each other
pub(crate) fn numbered_frames(width: u32, height: u32, count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::from_fn(width, height, |x, y| [(i * 40 % 256) as u8, (x * 30) as u8, (y * 30) as u8]))
        .collect()
}
