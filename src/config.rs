use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    effects::{BorderMode, CropPolicy},
    error::{ConfigError, Result},
    video::ResizeFilter,
};

/// Main configuration for clipsmith
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output encoding shared by both renditions
    pub encoding: EncodingConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Background blur settings
    pub blur: BlurConfig,

    /// Vertical Shorts layout
    pub shorts: ShortsConfig,

    /// Per-frame parallelism
    pub processing: ProcessingConfig,

    /// Batch orchestration
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.encoding.validate()?;
        self.blur.validate()?;
        self.shorts.validate()?;
        self.processing.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> crate::error::ClipsmithError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }.into()
}

/// Encoding parameters, identical for both target formats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// ffmpeg video encoder name
    pub codec: String,

    /// Constant target bitrate in ffmpeg notation ("50M", "8000k")
    pub bitrate: String,

    /// Output pixel format
    pub pixel_format: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            bitrate: "50M".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl EncodingConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(invalid("encoding.codec", &self.codec));
        }

        if !is_valid_bitrate(&self.bitrate) {
            return Err(invalid("encoding.bitrate", &self.bitrate));
        }

        if self.pixel_format.trim().is_empty() {
            return Err(invalid("encoding.pixel_format", &self.pixel_format));
        }

        Ok(())
    }
}

/// Digits with an optional k/K/m/M suffix, as accepted by `-b:v`
pub(crate) fn is_valid_bitrate(bitrate: &str) -> bool {
    let digits = bitrate
        .strip_suffix(['k', 'K', 'm', 'M'])
        .unwrap_or(bitrate);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && digits.parse::<u64>().map_or(false, |v| v > 0)
}

/// Locations of the ffmpeg binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// Box blur applied to the Shorts background
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Side length of the square mean kernel (odd)
    pub kernel_size: u32,

    /// How samples outside the frame are synthesized
    pub border: BorderMode,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kernel_size: 15,
            border: BorderMode::default(),
        }
    }
}

impl BlurConfig {
    fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(invalid("blur.kernel_size", self.kernel_size));
        }
        Ok(())
    }
}

/// Layout of the vertical Shorts rendition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortsConfig {
    /// Overlay size relative to the source (0.0-1.0]
    pub overlay_scale: f32,

    pub output_width: u32,
    pub output_height: u32,

    /// What to do when the 9:16 window spills past the source frame
    pub crop_policy: CropPolicy,

    /// Resampling filter for every rescale in the Shorts path
    pub filter: ResizeFilter,
}

impl Default for ShortsConfig {
    fn default() -> Self {
        Self {
            overlay_scale: 0.7,
            output_width: 1080,
            output_height: 1920,
            crop_policy: CropPolicy::default(),
            filter: ResizeFilter::default(),
        }
    }
}

impl ShortsConfig {
    fn validate(&self) -> Result<()> {
        if !(self.overlay_scale > 0.0 && self.overlay_scale <= 1.0) {
            return Err(invalid("shorts.overlay_scale", self.overlay_scale));
        }

        if self.output_width == 0 || self.output_height == 0
            || self.output_width % 2 != 0 || self.output_height % 2 != 0
        {
            return Err(invalid(
                "shorts.output_size",
                format!("{}x{}", self.output_width, self.output_height),
            ));
        }

        Ok(())
    }
}

/// Per-frame parallelism inside one rendition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of rayon worker threads
    pub threads: usize,

    /// Frames decoded and transformed together before being written out
    pub chunk_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            chunk_size: 16,
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(invalid("processing.threads", self.threads));
        }

        if self.chunk_size == 0 {
            return Err(invalid("processing.chunk_size", self.chunk_size));
        }

        Ok(())
    }
}

/// Batch orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files processed concurrently; each holds its own decoders and encoder
    pub workers: usize,

    /// File extensions picked up from the input directory
    pub extensions: Vec<String>,

    /// Output subdirectory for the Twitter rendition
    pub twitter_dir: String,

    /// Output subdirectory for the YouTube Shorts rendition
    pub youtube_dir: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() / 4).max(1),
            extensions: vec!["mp4".to_string()],
            twitter_dir: "twitter".to_string(),
            youtube_dir: "youtube".to_string(),
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("batch.workers", self.workers));
        }

        if self.extensions.is_empty() {
            return Err(invalid("batch.extensions", "[]"));
        }

        if self.twitter_dir.is_empty() || self.youtube_dir.is_empty() {
            return Err(invalid(
                "batch.output_dirs",
                format!("{:?}/{:?}", self.twitter_dir, self.youtube_dir),
            ));
        }

        Ok(())
    }
}
