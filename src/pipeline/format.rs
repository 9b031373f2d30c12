use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BatchConfig;

/// Target rendition of a source video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Source size and rate, followed by the outro
    Twitter,
    /// 1080x1920 blurred-background cut, followed by the outro
    YouTube,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Twitter, Format::YouTube];

    /// Prefix of every output file of this format
    pub fn tag(&self) -> &'static str {
        match self {
            Format::Twitter => "Twitter",
            Format::YouTube => "YouTube",
        }
    }

    /// Output subdirectory under the batch output root
    pub fn subdir<'a>(&self, batch: &'a BatchConfig) -> &'a str {
        match self {
            Format::Twitter => &batch.twitter_dir,
            Format::YouTube => &batch.youtube_dir,
        }
    }

    /// `<Tag>_<name>` with spaces in the source name replaced by underscores
    pub fn output_file_name(&self, source_name: &str) -> String {
        format!("{}_{}", self.tag(), sanitize_file_name(source_name))
    }

    /// Full output path for `source` under `output_root`
    pub fn output_path(&self, output_root: &Path, batch: &BatchConfig, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_root.join(self.subdir(batch)).join(self.output_file_name(&name))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    name.replace(' ', "_")
}
