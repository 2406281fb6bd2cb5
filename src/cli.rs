use crate::{
    CaptureOutcome, CapturePipeline, CaptureResult, CaptureTask, ChromeBackend, Config, Metrics,
    OutputFormat, PersistenceError, ProgressTracker, TaskSheet,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "batch-capture")]
#[command(about = "Batch website screenshots from a CSV or XLSX table")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Serve Prometheus metrics on this port")]
    pub metrics_port: Option<u16>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture every row of a CSV table and write the results back into it
    Capture {
        #[arg(short, long, help = "CSV or XLSX file with a target column and a label column")]
        input: PathBuf,

        #[arg(short, long, help = "Output directory for screenshots")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, help = "Number of targets captured concurrently")]
        batch_size: Option<usize>,

        #[arg(short, long, help = "Attempts per target before giving up")]
        retries: Option<usize>,

        #[arg(long, help = "Name of the target URL column")]
        target_column: Option<String>,

        #[arg(long, help = "Name of the label column")]
        label_column: Option<String>,

        #[arg(long, help = "Output format (png, jpeg, webp)")]
        format: Option<String>,

        #[arg(long, help = "Skip the thumbnail embedding pass")]
        no_embed: bool,

        #[arg(long, help = "Progress reporting interval in seconds")]
        progress_interval: Option<u64>,

        #[arg(long, help = "Write a JSON run summary to this path")]
        summary: Option<PathBuf>,
    },

    /// Capture a single target
    Single {
        #[arg(short, long, help = "URL to capture")]
        url: String,

        #[arg(short, long, default_value = "single", help = "Label used in the artifact name")]
        label: String,

        #[arg(short, long, help = "Output directory for the screenshot")]
        output_dir: Option<PathBuf>,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub input: PathBuf,
    pub no_embed: bool,
    pub progress_interval: Option<u64>,
    pub summary: Option<PathBuf>,
}

/// Totals of one `capture` run, written as JSON when requested.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub input: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: usize,
    pub skipped_rows: usize,
    pub tasks: usize,
    pub captured: usize,
    pub failed: usize,
    pub attempts: usize,
    pub thumbnails: Option<usize>,
}

impl RunSummary {
    pub fn from_results(
        run_id: uuid::Uuid,
        sheet: &TaskSheet,
        started_at: DateTime<Utc>,
        results: &[CaptureResult],
    ) -> Self {
        let captured = results.iter().filter(|r| r.is_success()).count();

        Self {
            run_id,
            input: sheet.path().to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            rows: sheet.row_count(),
            skipped_rows: sheet.skipped_rows(),
            tasks: results.len(),
            captured,
            failed: results.len() - captured,
            attempts: results.iter().map(CaptureResult::attempts).sum(),
            thumbnails: None,
        }
    }

    pub async fn write(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;
        Ok(())
    }
}

pub struct CliRunner {
    pub config: Config,
    pub metrics: Arc<Metrics>,
}

impl CliRunner {
    pub fn new(config: Config, metrics: Arc<Metrics>) -> Self {
        Self { config, metrics }
    }

    pub async fn run(mut self, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            Commands::Capture {
                input,
                output_dir,
                batch_size,
                retries,
                target_column,
                label_column,
                format,
                no_embed,
                progress_interval,
                summary,
            } => {
                if let Some(output_dir) = output_dir {
                    self.config.output_dir = output_dir;
                }
                if let Some(batch_size) = batch_size {
                    self.config.batch_size = batch_size;
                }
                if let Some(retries) = retries {
                    self.config.retry.max_attempts = retries;
                }
                if let Some(target_column) = target_column {
                    self.config.table.target_column = target_column;
                }
                if let Some(label_column) = label_column {
                    self.config.table.label_column = label_column;
                }
                if let Some(format) = format {
                    self.config.output_format = parse_format(&format)?;
                }
                self.config.validate()?;

                self.run_capture(CaptureOptions {
                    input,
                    no_embed,
                    progress_interval,
                    summary,
                })
                .await
            }
            Commands::Single { url, label, output_dir } => {
                if let Some(output_dir) = output_dir {
                    self.config.output_dir = output_dir;
                }
                self.run_single(url, label).await
            }
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    fn pipeline(&self) -> CapturePipeline<ChromeBackend> {
        CapturePipeline::new(ChromeBackend::new(self.config.clone()), self.config.clone())
            .with_metrics(self.metrics.clone())
    }

    pub async fn run_capture(&self, options: CaptureOptions) -> Result<(), Box<dyn std::error::Error>> {
        let run_id = uuid::Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting capture run {} for {}", run_id, options.input.display());

        let mut sheet = TaskSheet::load(&options.input, self.config.table.clone())?;
        let tasks = sheet.tasks();
        if sheet.skipped_rows() > 0 {
            warn!("Skipping {} rows without a target", sheet.skipped_rows());
        }

        fs::create_dir_all(&self.config.output_dir).await?;

        let tracker = Arc::new(ProgressTracker::new(tasks.len()));
        if let Some(interval) = options.progress_interval.filter(|secs| *secs > 0) {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval));

                while !tracker.is_complete() {
                    interval.tick().await;
                    let progress = tracker.get_progress();

                    println!(
                        "Progress: {}/{} ({:.1}%) - Success: {}, Errors: {}, Rate: {:.2}/s, ETA: {:?}",
                        progress.completed,
                        progress.total,
                        progress.percent(),
                        progress.success,
                        progress.errors,
                        progress.rate,
                        progress.eta
                    );
                }
            });
        }

        let results = self.pipeline().run_tracked(tasks, &tracker).await;

        let mut summary = RunSummary::from_results(run_id, &sheet, started_at, &results);
        info!(
            "Capture completed. Success: {}, Failed: {}",
            summary.captured, summary.failed
        );

        // Results stay in memory even when persisting fails below.
        sheet.record_results(&results);
        sheet.save()?;

        if self.config.embed_thumbnails && !options.no_embed {
            let thumbnail_dir = self.config.output_dir.join("thumbnails");
            let report = sheet.embed_thumbnails(&thumbnail_dir, self.config.thumbnail)?;
            sheet.save()?;
            summary.thumbnails = Some(report.embedded);
            info!("Thumbnails embedded in {}", sheet.path().display());
        }

        if let Some(path) = options.summary {
            summary.finished_at = Utc::now();
            summary.write(&path).await?;
            info!("Run summary written to {}", path.display());
        }

        Ok(())
    }

    pub async fn run_single(&self, url: String, label: String) -> Result<(), Box<dyn std::error::Error>> {
        let task = CaptureTask::new(url, label);
        info!("Capturing: {}", task.normalized_target());

        let result = self.pipeline().capture_with_retry(&task).await;

        match &result.outcome {
            CaptureOutcome::Captured { artifact, attempts } => {
                println!("Screenshot captured successfully:");
                println!("  URL: {}", task.normalized_target());
                println!("  Output: {}", artifact.display());
                println!("  Attempts: {attempts}");
                println!("  Duration: {}", crate::format_duration(result.duration));
                Ok(())
            }
            CaptureOutcome::Failed { attempts, last_error } => {
                error!("Failed to capture {} after {} attempts", task.target(), attempts);
                Err(format!("Capture failed: {last_error:?}").into())
            }
        }
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&config_content)?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Batch size: {}", config.batch_size);
        println!("  Attempts per target: {}", config.retry.max_attempts);
        println!("  Attempt timeout: {:?}", config.attempt_timeout());
        println!("  Output directory: {}", config.output_dir.display());
        println!("  Output format: {:?}", config.output_format);
        println!(
            "  Viewport: {}x{}",
            config.viewport.width, config.viewport.height
        );
        println!(
            "  Columns: target={:?}, label={:?}",
            config.table.target_column, config.table.label_column
        );

        Ok(())
    }
}

fn parse_format(name: &str) -> Result<OutputFormat, Box<dyn std::error::Error>> {
    OutputFormat::parse(name).ok_or_else(|| format!("Unsupported output format: {name}").into())
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
