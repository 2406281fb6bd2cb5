//! # Batch Capture
//!
//! Captures browser screenshots for every row of an XLSX or CSV table and
//! writes the artifact paths, plus fixed-size thumbnails, back into the same
//! table.
//!
//! Targets are processed in fixed-size batches: all tasks of a batch run
//! concurrently, each in its own browser session, and the next batch starts
//! only once every task of the current one has a result. A failed attempt is
//! retried up to the configured limit; a task that never succeeds is recorded
//! with an empty artifact cell and the run carries on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_capture::{CapturePipeline, ChromeBackend, Config, TaskSheet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut sheet = TaskSheet::load("sites.csv", config.table.clone())?;
//!
//!     let pipeline = CapturePipeline::new(ChromeBackend::new(config.clone()), config);
//!     let results = pipeline.run(sheet.tasks()).await;
//!
//!     sheet.record_results(&results);
//!     sheet.save()?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! batch-capture capture --input sites.csv --output-dir screenshots --batch-size 10
//! batch-capture single --url example.com --label Austin
//! ```

/// Configuration and settings for the pipeline
pub mod config;

/// Error types
pub mod error;

/// Capture collaborator abstraction
pub mod backend;

/// Headless Chromium implementation of the capture collaborator
pub mod chrome;

/// Capture tasks, results and batching
pub mod task;

/// Batch scheduler and capture-with-retry
pub mod pipeline;

/// XLSX/CSV task/result table and thumbnail embedding
pub mod table;

/// Command-line interface implementation
pub mod cli;

/// Metrics collection and export
pub mod telemetry;

/// Progress tracking across batches
pub mod progress;

/// Target normalization, artifact naming and formatting helpers
pub mod utils;


pub use backend::*;
pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use progress::*;
pub use table::*;
pub use task::*;
pub use telemetry::*;
pub use utils::*;
