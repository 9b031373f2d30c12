use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    config::Config,
    effects::{Conform, FrameEffect, JoinMode, RateConverter},
    error::{GeometryError, Result},
    pipeline::{layout::ShortsLayout, Format},
    video::{EncodedVideo, Encoder, Frame, FrameSource, RenderSpec},
};

/// Streams one source video into a finished rendition file
///
/// Every step pulls from decoders and pushes into the encoder in chunks of
/// `processing.chunk_size` frames, so memory use does not grow with the
/// length of the source:
/// 1. Open - probe and start decoding the source(s) and the outro
/// 2. Transform - per-format frame work, parallel within a chunk
/// 3. Outro - rate and size normalized to the main part
/// 4. Commit - finish the encode and move the file into place
pub struct RenditionEngine {
    config: Config,
    layout: ShortsLayout,
}

impl RenditionEngine {
    pub fn new(config: Config) -> Result<Self> {
        let layout = ShortsLayout::from_config(&config)?;
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &ShortsLayout {
        &self.layout
    }

    /// Render `source` + `outro` to `dest` in the given format
    pub fn render(&self, format: Format, source: &Path, outro: &Path, dest: &Path) -> Result<EncodedVideo> {
        match format {
            Format::Twitter => self.render_twitter(source, outro, dest),
            Format::YouTube => self.render_youtube(source, outro, dest),
        }
    }

    pub fn render_twitter(&self, source: &Path, outro: &Path, dest: &Path) -> Result<EncodedVideo> {
        info!("🐦 Rendering Twitter cut of {}", source.display());
        let tools = &self.config.tools;

        let main = FrameSource::open(source, tools)?;
        let outro = FrameSource::open(outro, tools)?;
        let lead = main.info().clone();

        let conform = Conform::new(lead.width, lead.height, JoinMode::Chain, self.layout.filter())?;
        conform.output_size(outro.info().width, outro.info().height)?;

        let spec = RenderSpec::new(lead.width, lead.height, &self.config.encoding);
        let mut encoder = Encoder::create(dest, &lead, &spec, tools)?;

        for frame in main {
            encoder.write_frame(&frame?)?;
        }
        let main_frames = encoder.frames_written();

        let outro_fps = outro.info().fps;
        let outro_frames = write_chunked(
            RateConverter::new(outro, outro_fps, lead.fps),
            self.chunk_size(),
            |frame| conform.apply(&frame),
            &mut encoder,
        )?;

        debug!("Twitter cut: {} source + {} outro frames", main_frames, outro_frames);
        encoder.finish()
    }

    pub fn render_youtube(&self, source: &Path, outro: &Path, dest: &Path) -> Result<EncodedVideo> {
        info!("📱 Rendering YouTube Shorts cut of {}", source.display());
        let tools = &self.config.tools;

        let background = FrameSource::open(source, tools)?;
        let overlay = FrameSource::open(source, tools)?;
        let outro = FrameSource::open(outro, tools)?;
        let info = background.info().clone();

        let region = self.layout.region_for(info.width, info.height)?;
        let (width, height) = self.layout.output();
        debug!("Shorts crop for {}x{}: {:?} -> {}x{}", info.width, info.height, region, width, height);

        let conform = Conform::new(width, height, JoinMode::Compose, self.layout.filter())?;
        conform.output_size(outro.info().width, outro.info().height)?;

        let spec = RenderSpec::new(width, height, &self.config.encoding);
        let mut encoder = Encoder::create(dest, &info.with_dimensions(width, height), &spec, tools)?;

        let overlay_fps = overlay.info().fps;
        let pairs = FramePairs::new(background, RateConverter::new(overlay, overlay_fps, info.fps));
        let main_frames = write_chunked(
            pairs,
            self.chunk_size(),
            |(bg, ov)| Ok(self.layout.render_frame(&bg, &ov, &region)),
            &mut encoder,
        )?;

        let outro_fps = outro.info().fps;
        let outro_frames = write_chunked(
            RateConverter::new(outro, outro_fps, info.fps),
            self.chunk_size(),
            |frame| conform.apply(&frame),
            &mut encoder,
        )?;

        debug!("Shorts cut: {} source + {} outro frames", main_frames, outro_frames);
        encoder.finish()
    }

    fn chunk_size(&self) -> usize {
        self.config.processing.chunk_size.max(1)
    }
}

/// Pull `chunk_size` items at a time, transform them in parallel and write
/// the results in order; returns the number of frames written
fn write_chunked<I, T, F>(mut items: I, chunk_size: usize, transform: F, encoder: &mut Encoder) -> Result<usize>
where
    I: Iterator<Item = Result<T>>,
    T: Send,
    F: Fn(T) -> Result<Frame> + Sync + Send,
{
    let mut written = 0;
    loop {
        let chunk = items.by_ref().take(chunk_size).collect::<Result<Vec<T>>>()?;
        if chunk.is_empty() {
            return Ok(written);
        }

        let frames = chunk
            .into_par_iter()
            .map(&transform)
            .collect::<Result<Vec<Frame>>>()?;

        for frame in &frames {
            encoder.write_frame(frame)?;
        }
        written += frames.len();
    }
}

/// Lockstep background/overlay stream; a length mismatch is an error
pub struct FramePairs<A, B> {
    background: A,
    overlay: B,
    paired: usize,
    done: bool,
}

impl<A, B> FramePairs<A, B>
where
    A: Iterator<Item = Result<Frame>>,
    B: Iterator<Item = Result<Frame>>,
{
    pub fn new(background: A, overlay: B) -> Self {
        Self { background, overlay, paired: 0, done: false }
    }
}

impl<A, B> Iterator for FramePairs<A, B>
where
    A: Iterator<Item = Result<Frame>>,
    B: Iterator<Item = Result<Frame>>,
{
    type Item = Result<(Frame, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = match (self.background.next(), self.overlay.next()) {
            (None, None) => None,
            (Some(Ok(bg)), Some(Ok(ov))) => {
                self.paired += 1;
                return Some(Ok((bg, ov)));
            }
            (Some(Err(e)), _) | (_, Some(Err(e))) => Some(Err(e)),
            (Some(Ok(_)), None) => Some(Err(GeometryError::DimensionMismatch {
                background: self.paired + 1,
                overlay: self.paired,
            }.into())),
            (None, Some(Ok(_))) => Some(Err(GeometryError::DimensionMismatch {
                background: self.paired,
                overlay: self.paired + 1,
            }.into())),
        };

        self.done = true;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClipsmithError, MediaError};
    use tempfile::TempDir;

    fn frames(count: usize) -> Vec<Result<Frame>> {
        (0..count).map(|i| Ok(Frame::new_filled(2, 2, [i as u8, 0, 0]))).collect()
    }

    #[test]
    fn test_pairs_in_lockstep() {
        let pairs: Vec<(Frame, Frame)> = FramePairs::new(frames(3).into_iter(), frames(3).into_iter())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(bg, ov)| bg == ov));
    }

    #[test]
    fn test_pairs_length_mismatch() {
        let result: Result<Vec<_>> = FramePairs::new(frames(3).into_iter(), frames(2).into_iter()).collect();
        assert!(matches!(
            result,
            Err(ClipsmithError::Geometry(GeometryError::DimensionMismatch { background: 3, overlay: 2 }))
        ));

        let mut pairs = FramePairs::new(frames(1).into_iter(), frames(2).into_iter());
        assert!(pairs.next().unwrap().is_ok());
        assert!(pairs.next().unwrap().is_err());
        assert!(pairs.next().is_none());
    }

    #[test]
    fn test_pairs_forward_decode_errors() {
        let mut overlay = frames(1);
        overlay.push(Err(ClipsmithError::decode("overlay.mp4", "truncated")));
        let result: Result<Vec<_>> = FramePairs::new(frames(2).into_iter(), overlay.into_iter()).collect();
        assert!(matches!(result, Err(ClipsmithError::Media(MediaError::Decode { .. }))));
    }

    #[test]
    fn test_missing_source_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let outro = dir.path().join("outro.mp4");
        std::fs::write(&outro, b"not a video").unwrap();
        let dest = dir.path().join("Twitter_missing.mp4");

        let engine = RenditionEngine::new(Config::default()).unwrap();
        for format in Format::ALL {
            let err = engine
                .render(format, &dir.path().join("missing.mp4"), &outro, &dest)
                .unwrap_err();
            assert!(err.is_media_open(), "{}: {}", format, err);
        }

        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use crate::pipeline::layout::{shorts_clip, twitter_clip};
        use crate::video::fake_tools::{self, PASSTHROUGH};
        use crate::video::{Clip, ClipInfo};

        fn engine_with(tools: crate::config::ToolsConfig) -> RenditionEngine {
            let mut config = Config::default();
            config.tools = tools;
            config.processing.chunk_size = 2;
            config.shorts.output_width = 8;
            config.shorts.output_height = 16;
            RenditionEngine::new(config).unwrap()
        }

        fn clip_of(fps: f64, frames: &[Frame]) -> Clip {
            let (width, height) = frames[0].dimensions();
            Clip::new(ClipInfo::new("clip", fps, width, height), frames.to_vec()).unwrap()
        }

        #[test]
        fn test_twitter_streams_source_then_outro() {
            let dir = TempDir::new().unwrap();
            let tools = fake_tools::install(dir.path(), PASSTHROUGH);
            let source = dir.path().join("source.mp4");
            let outro = dir.path().join("outro.mp4");
            let main_frames = fake_tools::numbered_frames(4, 2, 5);
            let outro_frames = fake_tools::numbered_frames(6, 6, 2);
            fake_tools::write_video(&source, "30/1", &main_frames);
            fake_tools::write_video(&outro, "30/1", &outro_frames);

            let dest = dir.path().join("Twitter_source.mp4");
            let engine = engine_with(tools);
            let encoded = engine.render(Format::Twitter, &source, &outro, &dest).unwrap();
            assert_eq!(encoded.frame_count, 7);

            let expected = twitter_clip(&clip_of(30.0, &main_frames), &clip_of(30.0, &outro_frames), engine.layout().filter()).unwrap();
            let written = std::fs::read(&dest).unwrap();
            assert_eq!(written, fake_tools::raw_bytes(expected.frames()));
            // The main part is passed through untouched
            assert_eq!(&written[..5 * 4 * 2 * 3], &fake_tools::raw_bytes(&main_frames)[..]);
        }

        #[test]
        fn test_youtube_streams_match_in_memory_render() {
            let dir = TempDir::new().unwrap();
            let tools = fake_tools::install(dir.path(), PASSTHROUGH);
            let source = dir.path().join("source.mp4");
            let outro = dir.path().join("outro.mp4");
            let main_frames = fake_tools::numbered_frames(16, 8, 5);
            let outro_frames = fake_tools::numbered_frames(6, 6, 2);
            fake_tools::write_video(&source, "30/1", &main_frames);
            fake_tools::write_video(&outro, "15/1", &outro_frames);

            let dest = dir.path().join("YouTube_source.mp4");
            let engine = engine_with(tools);
            let encoded = engine.render(Format::YouTube, &source, &outro, &dest).unwrap();

            // 2 outro frames at 15fps fill 4 frames at 30fps
            assert_eq!(encoded.frame_count, 9);
            let expected = shorts_clip(&clip_of(30.0, &main_frames), &clip_of(15.0, &outro_frames), engine.layout()).unwrap();
            let written = std::fs::read(&dest).unwrap();
            assert_eq!(written.len(), 9 * 8 * 16 * 3);
            assert_eq!(written, fake_tools::raw_bytes(expected.frames()));
        }

        #[test]
        fn test_failed_encode_leaves_no_output() {
            let dir = TempDir::new().unwrap();
            let body = "if [ \"$input\" = \"pipe:0\" ]; then\n  cat > /dev/null\n  exit 1\nfi\nexec cat \"$input.raw\"";
            let tools = fake_tools::install(dir.path(), body);
            let source = dir.path().join("source.mp4");
            fake_tools::write_video(&source, "30/1", &fake_tools::numbered_frames(16, 8, 3));

            let engine = engine_with(tools);
            for format in Format::ALL {
                let dest = dir.path().join(format!("{}_source.mp4", format));
                let err = engine.render(format, &source, &source, &dest).unwrap_err();
                assert!(err.is_encode(), "{}: {}", format, err);
                assert!(!dest.exists());
            }

            let leftovers: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".partial"))
                .collect();
            assert!(leftovers.is_empty(), "{:?}", leftovers);
        }
    }
}
