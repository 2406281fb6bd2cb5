use std::time::Duration;
use thiserror::Error;

/// Failure of a single capture attempt.
///
/// Every variant is transient from the pipeline's point of view: the attempt
/// is recorded as failed and the next one starts while attempts remain.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Artifact write failed: {0}")]
    ArtifactWriteFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Capture collaborator panicked: {0}")]
    Panicked(String),
}

impl CaptureError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::BrowserLaunchFailed(_) => "launch",
            CaptureError::NavigationFailed(_) => "navigation",
            CaptureError::PageError(_) => "page",
            CaptureError::RenderFailed(_) => "render",
            CaptureError::ArtifactWriteFailed(_) => "write",
            CaptureError::Timeout(_) => "timeout",
            CaptureError::Panicked(_) => "panic",
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        CaptureError::Panicked(message)
    }
}

/// Failure persisting the task/result table or its artifacts.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Workbook read error: {0}")]
    WorkbookRead(#[from] calamine::XlsxError),

    #[error("Workbook write error: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Workbook has no worksheet: {}", .0.display())]
    EmptyWorkbook(std::path::PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}
