//! End-to-end renditions through real ffmpeg processes.
//!
//! Every test returns early when `ffmpeg`/`ffprobe` with libx264 are not
//! installed.

use std::path::Path;
use std::process::Command;

use clipsmith::{
    batch::{BatchJob, BatchOrchestrator},
    config::Config,
    pipeline::{Format, RenditionEngine},
    video::{Clip, ClipInfo, Encoder, Frame, RenderSpec},
};
use tempfile::tempdir;

fn ffmpeg_available() -> bool {
    let probe_ok = Command::new("ffprobe").arg("-version").output().map_or(false, |o| o.status.success());
    let encoders = Command::new("ffmpeg").args(["-hide_banner", "-encoders"]).output();
    match encoders {
        Ok(out) if out.status.success() && probe_ok => String::from_utf8_lossy(&out.stdout).contains("libx264"),
        _ => {
            eprintln!("ffmpeg/ffprobe with libx264 not found, skipping");
            false
        }
    }
}

/// Write a synthetic clip whose frames differ from each other
fn write_clip(path: &Path, width: u32, height: u32, fps: f64, count: usize) {
    let config = Config::default();
    let info = ClipInfo::new(path.display().to_string(), fps, width, height);
    let frames = (0..count)
        .map(|i| {
            Frame::from_fn(width, height, |x, y| {
                [(x * 255 / width) as u8, (y * 255 / height) as u8, (i * 20 % 256) as u8]
            })
        })
        .collect();
    let clip = Clip::new(info, frames).unwrap();
    let spec = RenderSpec::new(width, height, &config.encoding);
    Encoder::encode_clip(path, &clip, &spec, &config.tools).unwrap();
}

fn decode(path: &Path) -> Clip {
    Clip::open(path, &Config::default().tools).unwrap()
}

#[test]
fn test_twitter_rendition() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    let outro = dir.path().join("outro.mp4");
    write_clip(&source, 64, 36, 30.0, 10);
    write_clip(&outro, 48, 48, 30.0, 3);

    let dest = dir.path().join("Twitter_source.mp4");
    let engine = RenditionEngine::new(Config::default()).unwrap();
    let encoded = engine.render(Format::Twitter, &source, &outro, &dest).unwrap();

    assert_eq!(encoded.frame_count, 13);
    let clip = decode(&dest);
    assert_eq!(clip.len(), 13);
    assert_eq!(clip.info().dimensions(), (64, 36));
    assert!((clip.fps() - 30.0).abs() < 0.01);
}

#[test]
fn test_youtube_rendition() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    let outro = dir.path().join("outro.mp4");
    write_clip(&source, 64, 36, 30.0, 10);
    write_clip(&outro, 32, 32, 15.0, 2);

    let dest = dir.path().join("YouTube_source.mp4");
    let engine = RenditionEngine::new(Config::default()).unwrap();
    let encoded = engine.render(Format::YouTube, &source, &outro, &dest).unwrap();

    // 2 outro frames at 15fps fill 4 frames at 30fps
    assert_eq!(encoded.frame_count, 14);
    let clip = decode(&dest);
    assert_eq!(clip.len(), 14);
    assert_eq!(clip.info().dimensions(), (1080, 1920));
}

#[test]
fn test_unwritable_destination() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    write_clip(&source, 64, 36, 30.0, 4);

    let dest = dir.path().join("missing_dir").join("Twitter_source.mp4");
    let engine = RenditionEngine::new(Config::default()).unwrap();
    let err = engine.render(Format::Twitter, &source, &source, &dest).unwrap_err();

    assert!(err.is_encode(), "{}", err);
    assert!(!dest.exists());
    assert!(!dir.path().join("missing_dir").exists());
}

#[tokio::test]
async fn test_batch_renders_and_archives() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let input_dir = dir.path().join("input");
    std::fs::create_dir(&input_dir).unwrap();
    write_clip(&input_dir.join("my clip.mp4"), 64, 36, 30.0, 5);
    let outro = dir.path().join("outro.mp4");
    write_clip(&outro, 64, 36, 30.0, 2);

    let job = BatchJob {
        input_dir: input_dir.clone(),
        output_dir: dir.path().join("output"),
        archive_dir: dir.path().join("archive"),
        twitter_outro: outro.clone(),
        youtube_outro: outro,
    };
    let engine = RenditionEngine::new(Config::default()).unwrap();
    let report = BatchOrchestrator::new(engine, job).run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.archived_files(), 1);

    let twitter = dir.path().join("output/twitter/Twitter_my_clip.mp4");
    let youtube = dir.path().join("output/youtube/YouTube_my_clip.mp4");
    assert_eq!(decode(&twitter).len(), 7);
    assert_eq!(decode(&youtube).info().dimensions(), (1080, 1920));

    let archived = std::fs::read(dir.path().join("archive/my clip.mp4")).unwrap();
    assert_eq!(archived, std::fs::read(input_dir.join("my clip.mp4")).unwrap());
}
