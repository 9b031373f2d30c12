//! # Batch Processing
//!
//! Renders every video of an input directory in both formats and archives
//! the originals that fully succeeded.
//!
//! Files are processed concurrently, at most `batch.workers` at a time; each
//! file runs its two renditions one after the other on a blocking thread.
//! A failed rendition is logged and recorded but never stops the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ClipsmithError, Result},
    pipeline::{Format, RenditionEngine},
    video::EncodedVideo,
};

/// Directories and outros for one batch run
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub twitter_outro: PathBuf,
    pub youtube_outro: PathBuf,
}

impl BatchJob {
    pub fn outro_for(&self, format: Format) -> &Path {
        match format {
            Format::Twitter => &self.twitter_outro,
            Format::YouTube => &self.youtube_outro,
        }
    }
}

/// Outcome of one format for one source file
#[derive(Debug)]
pub struct RenditionReport {
    pub format: Format,
    pub output: PathBuf,
    pub result: Result<EncodedVideo>,
}

/// Outcome of one source file
#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub renditions: Vec<RenditionReport>,
    /// Where the original was copied, when every rendition succeeded
    pub archived: Option<PathBuf>,
    /// Failure outside any rendition (archive copy, crashed worker)
    pub error: Option<ClipsmithError>,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.renditions.iter().all(|r| r.result.is_ok())
    }

    pub fn failed_renditions(&self) -> usize {
        self.renditions.iter().filter(|r| r.result.is_err()).count()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn archived_files(&self) -> usize {
        self.files.iter().filter(|f| f.archived.is_some()).count()
    }

    pub fn failed_renditions(&self) -> usize {
        self.files.iter().map(FileReport::failed_renditions).sum()
    }

    pub fn is_success(&self) -> bool {
        self.files.iter().all(FileReport::succeeded)
    }
}

pub struct BatchOrchestrator {
    engine: Arc<RenditionEngine>,
    job: Arc<BatchJob>,
}

impl BatchOrchestrator {
    pub fn new(engine: RenditionEngine, job: BatchJob) -> Self {
        Self {
            engine: Arc::new(engine),
            job: Arc::new(job),
        }
    }

    /// Process every input file; only setup failures are returned as errors
    pub async fn run(&self) -> Result<BatchReport> {
        info!("🎬 Starting batch");
        info!("   Input: {}", self.job.input_dir.display());
        info!("   Output: {}", self.job.output_dir.display());
        info!("   Archive: {}", self.job.archive_dir.display());

        let inputs = self.discover_inputs().await?;
        self.prepare_directories().await?;

        if inputs.is_empty() {
            warn!("No matching videos found in {}", self.job.input_dir.display());
            return Ok(BatchReport::default());
        }

        let workers = self.engine.config().batch.workers.max(1);
        info!("📹 Found {} videos, processing with {} workers", inputs.len(), workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(inputs.len());

        for source in inputs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ClipsmithError::generic(format!("worker pool closed: {}", e)))?;

            let engine = Arc::clone(&self.engine);
            let job = Arc::clone(&self.job);
            let task_source = source.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                process_file(&engine, &job, &task_source)
            });
            handles.push((source, handle));
        }

        let mut report = BatchReport::default();
        for (source, handle) in handles {
            let file = match handle.await {
                Ok(file) => file,
                Err(e) => crashed_report(source, e),
            };
            report.files.push(file);
        }

        info!("🎉 Batch complete: {} files, {} archived, {} failed renditions",
              report.total_files(), report.archived_files(), report.failed_renditions());
        Ok(report)
    }

    /// Regular, non-hidden files with a configured extension, sorted by name
    pub async fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let input_dir = &self.job.input_dir;
        let extensions = &self.engine.config().batch.extensions;

        let mut entries = tokio::fs::read_dir(input_dir).await.map_err(|e| {
            ClipsmithError::generic(format!("cannot read input directory {}: {}", input_dir.display(), e))
        })?;

        let mut inputs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.starts_with('.') || !entry.file_type().await?.is_file() {
                continue;
            }

            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| extensions.iter().any(|e| e == ext));

            if matches {
                inputs.push(path);
            } else {
                debug!("Skipping {}", name);
            }
        }

        inputs.sort();
        Ok(inputs)
    }

    async fn prepare_directories(&self) -> Result<()> {
        let batch = &self.engine.config().batch;
        for format in Format::ALL {
            tokio::fs::create_dir_all(self.job.output_dir.join(format.subdir(batch))).await?;
        }
        tokio::fs::create_dir_all(&self.job.archive_dir).await?;
        Ok(())
    }
}

/// Report for a file whose worker panicked; the rest of the batch carries on
fn crashed_report(source: PathBuf, err: JoinError) -> FileReport {
    error!("❌ Worker for {} crashed: {}", source.display(), err);
    FileReport {
        source,
        renditions: Vec::new(),
        archived: None,
        error: Some(ClipsmithError::generic(format!("worker crashed: {}", err))),
    }
}

/// Render both formats for one file, then archive it if both succeeded
fn process_file(engine: &RenditionEngine, job: &BatchJob, source: &Path) -> FileReport {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Processing {}", name);

    let renditions: Vec<RenditionReport> = Format::ALL
        .iter()
        .map(|&format| {
            let output = format.output_path(&job.output_dir, &engine.config().batch, source);
            let result = engine.render(format, source, job.outro_for(format), &output);
            if let Err(e) = &result {
                error!("❌ {} rendition of {} failed: {}", format, name, e.user_message());
            }
            RenditionReport { format, output, result }
        })
        .collect();

    let mut report = FileReport {
        source: source.to_path_buf(),
        renditions,
        archived: None,
        error: None,
    };

    if !report.succeeded() {
        warn!("Not archiving {}: {} of {} renditions failed",
              name, report.failed_renditions(), report.renditions.len());
        return report;
    }

    let archived = job.archive_dir.join(&name);
    match std::fs::copy(source, &archived) {
        Ok(_) => {
            info!("✅ {} done, archived to {}", name, archived.display());
            report.archived = Some(archived);
        }
        Err(e) => {
            error!("❌ Failed to archive {}: {}", name, e);
            report.error = Some(e.into());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::{tempdir, TempDir};

    fn job_in(root: &TempDir) -> BatchJob {
        let input_dir = root.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        BatchJob {
            input_dir,
            output_dir: root.path().join("output"),
            archive_dir: root.path().join("archive"),
            twitter_outro: root.path().join("twitter_outro.mp4"),
            youtube_outro: root.path().join("youtube_outro.mp4"),
        }
    }

    fn orchestrator(job: BatchJob) -> BatchOrchestrator {
        let mut config = Config::default();
        config.batch.workers = 2;
        BatchOrchestrator::new(RenditionEngine::new(config).unwrap(), job)
    }

    #[tokio::test]
    async fn test_empty_input_directory() {
        let root = tempdir().unwrap();
        let orchestrator = orchestrator(job_in(&root));

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.total_files(), 0);
        assert!(report.is_success());

        // Output layout is created even when there is nothing to do
        assert!(root.path().join("output/twitter").is_dir());
        assert!(root.path().join("output/youtube").is_dir());
        assert!(root.path().join("archive").is_dir());
    }

    #[tokio::test]
    async fn test_missing_input_directory() {
        let root = tempdir().unwrap();
        let mut job = job_in(&root);
        job.input_dir = root.path().join("nope");

        assert!(orchestrator(job).run().await.is_err());
    }

    #[tokio::test]
    async fn test_discover_filters_and_sorts() {
        let root = tempdir().unwrap();
        let job = job_in(&root);
        for name in ["b clip.mp4", "a.mp4", ".hidden.mp4", "notes.txt", "upper.MP4"] {
            std::fs::write(job.input_dir.join(name), b"x").unwrap();
        }
        std::fs::create_dir(job.input_dir.join("folder.mp4")).unwrap();

        let inputs = orchestrator(job.clone()).discover_inputs().await.unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b clip.mp4"]);
    }

    #[tokio::test]
    async fn test_broken_file_fails_both_and_is_not_archived() {
        let root = tempdir().unwrap();
        let job = job_in(&root);
        std::fs::write(job.input_dir.join("broken clip.mp4"), b"definitely not a video").unwrap();

        let report = orchestrator(job).run().await.unwrap();
        assert_eq!(report.total_files(), 1);
        assert!(!report.is_success());
        assert_eq!(report.failed_renditions(), 2);
        assert_eq!(report.archived_files(), 0);

        let file = &report.files[0];
        let outputs: Vec<_> = file.renditions.iter().map(|r| r.output.clone()).collect();
        assert_eq!(outputs, vec![
            root.path().join("output/twitter/Twitter_broken_clip.mp4"),
            root.path().join("output/youtube/YouTube_broken_clip.mp4"),
        ]);
        assert!(outputs.iter().all(|p| !p.exists()));

        assert_eq!(std::fs::read_dir(root.path().join("archive")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path().join("output/twitter")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path().join("output/youtube")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported_as_failed() {
        let source = PathBuf::from("input/crash.mp4");
        let handle = tokio::task::spawn_blocking(|| -> FileReport { panic!("frame worker blew up") });
        let err = handle.await.unwrap_err();
        assert!(err.is_panic());

        let report = crashed_report(source.clone(), err);
        assert_eq!(report.source, source);
        assert!(!report.succeeded());
        assert!(report.archived.is_none());
        assert!(report.error.unwrap().to_string().contains("worker crashed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_batch_renders_and_archives_with_fake_ffmpeg() {
        use crate::video::fake_tools::{self, PASSTHROUGH};

        let root = tempdir().unwrap();
        let job = job_in(&root);
        let source = job.input_dir.join("my clip.mp4");
        fake_tools::write_video(&source, "30/1", &fake_tools::numbered_frames(16, 8, 3));
        fake_tools::write_video(&job.twitter_outro, "30/1", &fake_tools::numbered_frames(16, 8, 2));
        fake_tools::write_video(&job.youtube_outro, "30/1", &fake_tools::numbered_frames(8, 8, 2));

        let mut config = Config::default();
        config.tools = fake_tools::install(root.path(), PASSTHROUGH);
        config.shorts.output_width = 8;
        config.shorts.output_height = 16;
        let orchestrator = BatchOrchestrator::new(RenditionEngine::new(config).unwrap(), job);

        let report = orchestrator.run().await.unwrap();
        assert!(report.is_success(), "{:?}", report);
        // The `.raw` sidecar is not a video extension and is skipped
        assert_eq!(report.total_files(), 1);
        assert_eq!(report.archived_files(), 1);

        let twitter = std::fs::read(root.path().join("output/twitter/Twitter_my_clip.mp4")).unwrap();
        let youtube = std::fs::read(root.path().join("output/youtube/YouTube_my_clip.mp4")).unwrap();
        assert_eq!(twitter.len(), 5 * 16 * 8 * 3);
        assert_eq!(youtube.len(), 5 * 8 * 16 * 3);
        assert_eq!(
            std::fs::read(root.path().join("archive/my clip.mp4")).unwrap(),
            std::fs::read(&source).unwrap()
        );
    }
}
