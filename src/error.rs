use thiserror::Error;

/// Main error type for the clipsmith library
#[derive(Error, Debug)]
pub enum ClipsmithError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while opening, decoding or encoding media files
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to open media file {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to decode {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: String, reason: String },
}

/// Errors raised when clips or regions cannot be combined geometrically
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Frame count mismatch: background has {background} frames, overlay has {overlay}")]
    DimensionMismatch { background: usize, overlay: usize },

    #[error("Clips cannot be joined: {reason}")]
    IncompatibleClip { reason: String },

    #[error("Invalid crop region for {width}x{height} source: {reason}")]
    InvalidCropRegion { width: u32, height: u32, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ClipsmithError
pub type Result<T> = std::result::Result<T, ClipsmithError>;

impl ClipsmithError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    pub(crate) fn open<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        MediaError::Open { path: path.into(), reason: reason.into() }.into()
    }

    pub(crate) fn decode<S: Into<String>, R: Into<String>>(source_name: S, reason: R) -> Self {
        MediaError::Decode { source_name: source_name.into(), reason: reason.into() }.into()
    }

    pub(crate) fn encode<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        MediaError::Encode { path: path.into(), reason: reason.into() }.into()
    }

    pub(crate) fn incompatible<R: Into<String>>(reason: R) -> Self {
        GeometryError::IncompatibleClip { reason: reason.into() }.into()
    }

    /// True when the failure came from a source or outro that could not be opened
    pub fn is_media_open(&self) -> bool {
        matches!(self, Self::Media(MediaError::Open { .. }))
    }

    /// True when the failure happened while writing an output file
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Media(MediaError::Encode { .. }))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Media(MediaError::Open { path, .. }) => {
                format!("Could not open '{}'. Please check the file exists and is a video ffmpeg can read.", path)
            }
            Self::Media(MediaError::Encode { path, reason }) => {
                format!("Could not write '{}' ({}). Is the output directory writable and ffmpeg installed?", path, reason)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
