//! Build result types.
//!
//! Contains types for representing the outcome of stage and build runs.

use crate::paths::AssetClass;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Outputs were written
    Written,
    /// Skipped (already up to date)
    Skipped,
    /// Transform failed with error
    Failed(String),
}

impl FileStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Written | FileStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, FileStatus::Failed(_))
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Written => write!(f, "written"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of processing a single source file.
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file that was processed
    pub source: PathBuf,
    /// Outcome
    pub status: FileStatus,
    /// Output files written
    pub outputs: Vec<PathBuf>,
}

impl FileResult {
    /// Create a written result.
    pub fn written(source: PathBuf, outputs: Vec<PathBuf>) -> Self {
        Self { source, status: FileStatus::Written, outputs }
    }

    /// Create a skipped result.
    pub fn skipped(source: PathBuf) -> Self {
        Self { source, status: FileStatus::Skipped, outputs: vec![] }
    }

    /// Create a failed result.
    pub fn failed(source: PathBuf, error: String) -> Self {
        Self { source, status: FileStatus::Failed(error), outputs: vec![] }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of one run of one class's stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Class the stage belongs to
    pub class: AssetClass,
    /// Per-file results, in source order
    pub files: Vec<FileResult>,
    /// Stage duration
    pub duration: Duration,
}

impl StageReport {
    /// Create an empty report.
    pub fn new(class: AssetClass) -> Self {
        Self { class, files: Vec::new(), duration: Duration::ZERO }
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Number of files whose outputs were written.
    pub fn written_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, FileStatus::Written)).count()
    }

    /// Number of up-to-date files.
    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, FileStatus::Skipped)).count()
    }

    /// Number of failed files.
    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if no file failed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs written.
    pub fn outputs(&self) -> Vec<&PathBuf> {
        self.files.iter().flat_map(|r| r.outputs.iter()).collect()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Reports for each stage, in class order
    pub stages: Vec<StageReport>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildReport {
    /// Create a new empty build report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage report.
    pub fn add_stage(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Report for one class, if it ran.
    pub fn stage(&self, class: AssetClass) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.class == class)
    }

    /// Get the number of written files.
    pub fn written_count(&self) -> usize {
        self.stages.iter().map(StageReport::written_count).sum()
    }

    /// Get the number of skipped files.
    pub fn skipped_count(&self) -> usize {
        self.stages.iter().map(StageReport::skipped_count).sum()
    }

    /// Get the number of failed files.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().map(StageReport::failed_count).sum()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs written.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.stages.iter().flat_map(|s| s.outputs()).collect()
    }

    /// Get failed file results with their class.
    pub fn failures(&self) -> Vec<(AssetClass, &FileResult)> {
        self.stages
            .iter()
            .flat_map(|s| {
                s.files.iter().filter(|r| r.status.is_failure()).map(move |r| (s.class, r))
            })
            .collect()
    }

    /// Format a summary of the build report.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let written = self.written_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = written + skipped + failed;

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} written, {} skipped, {} failed ({} total)",
                written, skipped, failed, total
            ));
            for (class, file) in self.failures().iter().take(10) {
                lines.push(format!(
                    "  - [{}] {}: {}",
                    class.label(),
                    file.source.display(),
                    file.status
                ));
            }
            if failed > 10 {
                lines.push(format!("  ... and {} more", failed - 10));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} written, {} skipped ({} total) in {:?}",
                written, skipped, total, self.total_duration
            ));
        }

        lines.join("\n")
    }
}
