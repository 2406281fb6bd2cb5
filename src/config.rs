//! Configuration management with serde serialization/deserialization
//!
//! This module provides the configuration structures for the capture pipeline:
//! batching and retry policy, browser settings, output format and the column
//! layout of the tabular store.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Desktop user agent sent with every navigation unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Main configuration structure for the capture pipeline
///
/// Passed explicitly to every component that needs it; nothing is read from
/// ambient process state.
///
/// # Examples
///
/// ```rust
/// use batch_capture::Config;
///
/// // Use default configuration
/// let config = Config::default();
/// assert_eq!(config.batch_size, 10);
///
/// // Smaller batches, more attempts
/// let config = Config {
///     batch_size: 4,
///     retry: batch_capture::RetryConfig { max_attempts: 5, ..Default::default() },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of tasks captured concurrently per batch (default: 10)
    ///
    /// This is also the maximum number of browser sessions alive at once.
    pub batch_size: usize,

    /// Retry policy for individual capture attempts
    pub retry: RetryConfig,

    /// Optional hard limit for one attempt, in milliseconds (default: none)
    ///
    /// Without it an attempt waits as long as the page needs to load.
    pub attempt_timeout_ms: Option<u64>,

    /// Directory receiving the captured artifacts (default: `screenshots`)
    pub output_dir: PathBuf,

    /// Output image format for artifacts (default: PNG)
    pub output_format: OutputFormat,

    /// Browser viewport configuration for captures
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// User-Agent string sent by the browser
    pub user_agent: Option<String>,

    /// Column layout of the input/output table
    pub table: TableColumns,

    /// Size of the thumbnails embedded back into the table
    pub thumbnail: ThumbnailSize,

    /// Whether to run the thumbnail embedding pass after writing results
    pub embed_thumbnails: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retry: RetryConfig::default(),
            attempt_timeout_ms: None,
            output_dir: PathBuf::from("screenshots"),
            output_format: OutputFormat::Png,
            viewport: Viewport::default(),
            chrome_path: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            table: TableColumns::default(),
            thumbnail: ThumbnailSize::default(),
            embed_thumbnails: true,
        }
    }
}

impl Config {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("Batch size must be greater than 0".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("Retry attempts must be greater than 0".into()));
        }

        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid("Retry multiplier must be at least 1.0".into()));
        }

        if let Some(timeout) = self.attempt_timeout_ms {
            if timeout == 0 {
                return Err(ConfigError::Invalid("Attempt timeout must be greater than 0".into()));
            }
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid("Viewport dimensions must be greater than 0".into()));
        }

        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(ConfigError::Invalid("Thumbnail dimensions must be greater than 0".into()));
        }

        for (name, value) in [
            ("target", &self.table.target_column),
            ("label", &self.table.label_column),
            ("artifact", &self.table.artifact_column),
            ("embed", &self.table.embed_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("The {name} column name must not be empty")));
            }
        }

        Ok(())
    }
}

/// Browser viewport configuration for captures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio for high-DPI displays (default: 1.0)
    pub device_scale_factor: f64,

    /// Whether to emulate mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Supported output image formats for artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG format - lossless compression, best quality
    Png,
    /// JPEG format - lossy compression, smaller files
    Jpeg,
    /// WebP format - modern compression, good balance of size and quality
    Webp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

/// Delay policy between failed attempts of one task.
///
/// The default delay is zero: a failed attempt is followed immediately by
/// the next one. A non-zero `initial_delay_ms` turns on exponential backoff
/// capped at `max_delay_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 0,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the failed attempt with zero-based index `attempt`.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        if self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }

        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }
}

/// Column names of the tabular store
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TableColumns {
    /// Column holding the target URL (default: `WEBSITE URL`)
    pub target_column: String,
    /// Column holding the label used in artifact names (default: `CITY`)
    pub label_column: String,
    /// Column receiving the artifact path (default: `Screenshots`)
    pub artifact_column: String,
    /// Column receiving the thumbnail path (default: `Embedded Screenshot`)
    pub embed_column: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            target_column: "WEBSITE URL".to_string(),
            label_column: "CITY".to_string(),
            artifact_column: "Screenshots".to_string(),
            embed_column: "Embedded Screenshot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: 200,
            height: 150,
        }
    }
}

/// Generate Chrome command-line arguments for one capture session
///
/// Each session gets its own profile directory so concurrent browsers never
/// collide on Chrome's process singleton.
///
/// # Examples
///
/// ```rust
/// use batch_capture::{Config, get_chrome_args};
/// use std::path::Path;
///
/// let config = Config::default();
/// let args = get_chrome_args(&config, Path::new("/tmp/profile"));
/// assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
/// ```
pub fn get_chrome_args(config: &Config, profile_dir: &std::path::Path) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--disable-features=TranslateUI,ProcessSingleton".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir={}", profile_dir.display()),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.attempt_timeout().is_none());
        assert_eq!(config.output_dir, PathBuf::from("screenshots"));
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.table.target_column, "WEBSITE URL");
        assert_eq!(config.table.label_column, "CITY");
        assert_eq!(config.thumbnail.width, 200);
        assert_eq!(config.thumbnail.height, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config { batch_size: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.thumbnail.height = 0;
        assert!(config.validate().is_err());

        let config = Config {
            attempt_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.table.label_column = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_defaults_to_immediate() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_after(0), Duration::ZERO);
        assert_eq!(retry.delay_after(5), Duration::ZERO);
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let retry = RetryConfig {
            initial_delay_ms: 100,
            max_delay_ms: 300,
            ..Default::default()
        };
        assert_eq!(retry.delay_after(0), Duration::from_millis(100));
        assert_eq!(retry.delay_after(1), Duration::from_millis(200));
        assert_eq!(retry.delay_after(2), Duration::from_millis(300));
        assert_eq!(retry.delay_after(10), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_json_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"batch_size": 4, "retry": {"max_attempts": 5}}"#).unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert_eq!(config.table.artifact_column, "Screenshots");
    }

    #[test]
    fn test_json_durations_are_plain_numbers() {
        let config: Config = serde_json::from_str(
            r#"{"attempt_timeout_ms": 30000, "retry": {"initial_delay_ms": 250, "max_delay_ms": 2000}, "output_format": "jpeg"}"#,
        )
        .unwrap();
        assert_eq!(config.attempt_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.retry.delay_after(0), Duration::from_millis(250));
        assert_eq!(config.retry.delay_after(4), Duration::from_secs(2));
        assert_eq!(config.output_format, OutputFormat::Jpeg);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["attempt_timeout_ms"], 30000);
        assert_eq!(json["retry"]["max_delay_ms"], 2000);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("PNG"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::parse("jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::parse("jpg").map(|f| f.extension()), Some("jpg"));
        assert_eq!(OutputFormat::parse("gif"), None);
    }

    #[test]
    fn test_chrome_args_generation() {
        let config = Config::default();
        let args = get_chrome_args(&config, std::path::Path::new("/tmp/p1"));

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&format!("--window-size={},{}", config.viewport.width, config.viewport.height)));
        assert!(args.contains(&format!("--user-agent={DEFAULT_USER_AGENT}")));
        assert!(args.contains(&"--user-data-dir=/tmp/p1".to_string()));
    }
}
