//! Batch capture pipeline
//!
//! Runs capture-with-retry over a list of tasks in fixed-size batches. Tasks
//! inside a batch run concurrently; the next batch starts only after every
//! task of the current one has produced a result. Results come back in the
//! order the tasks were submitted.

use crate::{
    format_bytes, format_duration, partition, CaptureBackend, CaptureError, CaptureOutcome, CaptureResult,
    CaptureTask, Config, Metrics, ProgressTracker,
};
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout_at};
use tracing::{debug, error, info, warn};

/// Capture pipeline over a [`CaptureBackend`]
///
/// # Examples
///
/// ```rust,no_run
/// use batch_capture::{CapturePipeline, CaptureTask, ChromeBackend, Config};
///
/// #[tokio::main]
/// async fn main() {
///     let config = Config::default();
///     let pipeline = CapturePipeline::new(ChromeBackend::new(config.clone()), config);
///
///     let tasks = vec![CaptureTask::new("example.com", "Austin")];
///     for result in pipeline.run(tasks).await {
///         println!("{} -> {:?}", result.task.target(), result.artifact());
///     }
/// }
/// ```
pub struct CapturePipeline<B: CaptureBackend> {
    backend: B,
    config: Config,
    metrics: Arc<Metrics>,
}

impl<B: CaptureBackend> CapturePipeline<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            backend,
            config,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, tasks: Vec<CaptureTask>) -> Vec<CaptureResult> {
        let tracker = ProgressTracker::new(tasks.len());
        self.run_tracked(tasks, &tracker).await
    }

    /// Run every task, reporting completions to `tracker`.
    ///
    /// Never fails: a task that exhausts its attempts yields a
    /// [`CaptureOutcome::Failed`] result and the pipeline moves on.
    pub async fn run_tracked(&self, tasks: Vec<CaptureTask>, tracker: &ProgressTracker) -> Vec<CaptureResult> {
        let batch_size = self.config.batch_size.max(1);
        let batch_count = tasks.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(tasks.len());

        for (index, batch) in partition(&tasks, batch_size).enumerate() {
            info!("Processing batch {} of {} ({} tasks)", index + 1, batch_count, batch.len());

            // join_all yields outputs in the order the futures were given,
            // regardless of which finishes first.
            let batch_results = join_all(batch.iter().map(|task| self.capture_with_retry(task))).await;

            for result in &batch_results {
                tracker.record_completion(result.is_success());
            }
            results.extend(batch_results);
            self.metrics.record_batch();

            let progress = tracker.get_progress();
            info!(
                "Batch {} of {} done: {}/{} ({:.1}%) - Success: {}, Failed: {}, Elapsed: {}",
                index + 1,
                batch_count,
                progress.completed,
                progress.total,
                progress.percent(),
                progress.success,
                progress.errors,
                format_duration(progress.elapsed)
            );
        }

        results
    }

    /// Capture one task, retrying failed attempts up to the configured limit.
    pub async fn capture_with_retry(&self, task: &CaptureTask) -> CaptureResult {
        let start_time = Instant::now();
        let target = task.normalized_target();
        let artifact = task.artifact_path(&self.config.output_dir, self.config.output_format);
        let max_attempts = self.config.retry.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            info!("Visiting: {} (attempt {}/{})", target, attempt, max_attempts);

            match self.attempt(&target, &artifact).await {
                Ok(()) => {
                    self.metrics.record_attempt(true);
                    let duration = start_time.elapsed();
                    self.metrics.record_capture(duration, true);
                    info!("Artifact saved: {} (attempt {})", artifact.display(), attempt);

                    return CaptureResult {
                        task: task.clone(),
                        outcome: CaptureOutcome::Captured {
                            artifact,
                            attempts: attempt,
                        },
                        duration,
                    };
                }
                Err(e) => {
                    self.metrics.record_attempt(false);
                    warn!(
                        kind = e.kind(),
                        "Error capturing {} (attempt {}/{}): {}", target, attempt, max_attempts, e
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        let delay = self.config.retry.delay_after(attempt - 1);
                        if !delay.is_zero() {
                            debug!("Retrying {} after {:?}", target, delay);
                            sleep(delay).await;
                        }
                    }
                }
            }
        }

        error!("Failed to capture {} after {} attempts", target, max_attempts);
        let duration = start_time.elapsed();
        self.metrics.record_capture(duration, false);

        CaptureResult {
            task: task.clone(),
            outcome: CaptureOutcome::Failed {
                attempts: max_attempts,
                last_error,
            },
            duration,
        }
    }

    /// One attempt: open a fresh session, render, release the session, then
    /// persist the artifact.
    async fn attempt(&self, target: &str, artifact: &Path) -> Result<(), CaptureError> {
        let deadline = self
            .config
            .attempt_timeout()
            .map(|limit| tokio::time::Instant::now() + limit);

        let mut session = self.guarded(deadline, self.backend.open(target)).await?;
        self.metrics.session_opened();

        let rendered = self.guarded(deadline, self.backend.render(&mut session)).await;

        // Released on every path, including a render that errored, timed out or panicked.
        if let Err(payload) = AssertUnwindSafe(self.backend.close(session)).catch_unwind().await {
            warn!("Session close panicked: {}", CaptureError::from_panic(payload));
        }
        self.metrics.session_closed();

        let data = rendered?;

        if let Some(parent) = artifact.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CaptureError::ArtifactWriteFailed(e.to_string()))?;
        }
        tokio::fs::write(artifact, &data)
            .await
            .map_err(|e| CaptureError::ArtifactWriteFailed(e.to_string()))?;
        debug!("Wrote {} to {}", format_bytes(data.len()), artifact.display());

        Ok(())
    }

    /// Await a collaborator call, turning panics and an expired deadline into
    /// attempt errors.
    async fn guarded<T, F>(&self, deadline: Option<tokio::time::Instant>, call: F) -> Result<T, CaptureError>
    where
        F: Future<Output = Result<T, CaptureError>>,
    {
        let call = AssertUnwindSafe(call).catch_unwind();

        let caught = match deadline {
            Some(deadline) => match timeout_at(deadline, call).await {
                Ok(caught) => caught,
                Err(_) => {
                    return Err(CaptureError::Timeout(
                        self.config.attempt_timeout().unwrap_or_default(),
                    ))
                }
            },
            None => call.await,
        };

        caught.unwrap_or_else(|payload| Err(CaptureError::from_panic(payload)))
    }
}
