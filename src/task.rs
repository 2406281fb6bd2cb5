//! Units of work flowing through the capture pipeline and their outcomes.

use crate::{artifact_stem, normalize_target, CaptureError, OutputFormat};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One target to capture, labelled for naming its artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTask {
    target: String,
    label: String,
}

impl CaptureTask {
    pub fn new(target: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            target: target.into().trim().to_string(),
            label: label.into().trim().to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Target with an `https://` scheme prepended when it has none.
    pub fn normalized_target(&self) -> String {
        normalize_target(&self.target)
    }

    /// Deterministic artifact file stem, `<domain>_<label>`.
    pub fn artifact_stem(&self) -> String {
        artifact_stem(&self.target, &self.label)
    }

    pub fn artifact_path(&self, output_dir: &Path, format: OutputFormat) -> PathBuf {
        output_dir.join(format!("{}.{}", self.artifact_stem(), format.extension()))
    }
}

#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// An artifact was written on attempt number `attempts`.
    Captured { artifact: PathBuf, attempts: usize },
    /// Every attempt failed; the artifact is absent.
    Failed {
        attempts: usize,
        last_error: Option<CaptureError>,
    },
}

/// Outcome of one task, produced exactly once per submitted task.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub task: CaptureTask,
    pub outcome: CaptureOutcome,
    pub duration: Duration,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Captured { .. })
    }

    /// Artifact reference, or `None` as the absent marker.
    pub fn artifact(&self) -> Option<&Path> {
        match &self.outcome {
            CaptureOutcome::Captured { artifact, .. } => Some(artifact),
            CaptureOutcome::Failed { .. } => None,
        }
    }

    pub fn attempts(&self) -> usize {
        match &self.outcome {
            CaptureOutcome::Captured { attempts, .. } | CaptureOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Split tasks into consecutive batches of at most `batch_size`.
///
/// ```rust
/// use batch_capture::{partition, CaptureTask};
///
/// let tasks: Vec<_> = (0..25).map(|i| CaptureTask::new(format!("site{i}.com"), "x")).collect();
/// let sizes: Vec<_> = partition(&tasks, 10).map(|batch| batch.len()).collect();
/// assert_eq!(sizes, vec![10, 10, 5]);
/// ```
pub fn partition(tasks: &[CaptureTask], batch_size: usize) -> std::slice::Chunks<'_, CaptureTask> {
    tasks.chunks(batch_size.max(1))
}
