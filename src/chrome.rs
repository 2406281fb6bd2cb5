//! Headless Chromium capture backend
//!
//! Every session launches its own browser with an isolated profile
//! directory, so concurrent sessions never share state and a crashed
//! browser only costs the attempt that owned it.

use crate::{get_chrome_args, CaptureBackend, CaptureError, Config, OutputFormat};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport as ChromeViewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// CDP has no "wait forever"; a day is longer than any page load we care about.
const UNBOUNDED_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Resolves once the document is complete and no new resource entries have
/// appeared for a full second.
const NETWORK_SETTLE_SCRIPT: &str = r#"(async () => {
    const idleMs = 1000;
    const interval = 250;
    const count = () => {
        try { return performance.getEntriesByType('resource').length; } catch (_) { return 0; }
    };
    let last = count();
    let stable = 0;
    while (stable < idleMs) {
        await new Promise(r => setTimeout(r, interval));
        const current = count();
        if (document.readyState === 'complete' && current === last) {
            stable += interval;
        } else {
            stable = 0;
        }
        last = current;
    }
    return last;
})()"#;

pub struct ChromeBackend {
    config: Config,
}

/// One exclusive browser process with a single page.
///
/// Dropping a session without [`close`](CaptureBackend::close), e.g. when an
/// attempt deadline cancels `open` halfway, still stops the CDP handler, kills
/// the browser and removes the profile directory.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: ProfileDir,
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Temporary browser profile directory, removed on drop.
struct ProfileDir(PathBuf);

impl ProfileDir {
    fn create_in(base: &Path) -> std::io::Result<Self> {
        let path = base.join(format!(
            "batch-capture-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.0) {
            Ok(()) => debug!("Removed browser profile {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove browser profile {}: {}", self.0.display(), e),
        }
    }
}

impl ChromeBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, CaptureError> {
        let viewport = &self.config.viewport;

        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .viewport(ChromeViewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: Some(viewport.device_scale_factor),
                emulating_mobile: viewport.mobile,
                is_landscape: viewport.width > viewport.height,
                has_touch: viewport.mobile,
            })
            .request_timeout(self.config.attempt_timeout().unwrap_or(UNBOUNDED_REQUEST_TIMEOUT))
            .args(get_chrome_args(&self.config, profile_dir));

        if let Some(chrome_path) = &self.config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        builder.build().map_err(CaptureError::BrowserLaunchFailed)
    }

    async fn launch(&self) -> Result<ChromeSession, CaptureError> {
        let profile_dir = ProfileDir::create_in(&std::env::temp_dir())
            .map_err(|e| CaptureError::BrowserLaunchFailed(format!("Failed to create profile dir: {e}")))?;

        let browser_config = self.browser_config(profile_dir.path())?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler is a Stream that drives all CDP traffic; it must be polled
        // for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        Ok(ChromeSession {
            browser,
            handler,
            page: None,
            profile_dir,
        })
    }

    async fn navigate(page: &Page, target: &str) -> Result<(), CaptureError> {
        page.goto(target)
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;

        let settle = EvaluateParams::builder()
            .expression(NETWORK_SETTLE_SCRIPT)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(CaptureError::PageError)?;
        page.evaluate_expression(settle)
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;

        page.find_element("body")
            .await
            .map_err(|e| CaptureError::PageError(format!("body not present: {e}")))?;

        Ok(())
    }

    fn convert_image_format(&self, png_data: Vec<u8>) -> Result<Vec<u8>, CaptureError> {
        let format = match self.config.output_format {
            OutputFormat::Png => return Ok(png_data),
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Webp => image::ImageFormat::WebP,
        };

        let img = image::load_from_memory(&png_data)
            .map_err(|e| CaptureError::RenderFailed(e.to_string()))?;

        let mut data = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut data), format)
            .map_err(|e| CaptureError::RenderFailed(e.to_string()))?;

        Ok(data)
    }
}

#[async_trait]
impl CaptureBackend for ChromeBackend {
    type Session = ChromeSession;

    async fn open(&self, target: &str) -> Result<ChromeSession, CaptureError> {
        // No browser for targets that can never load.
        Url::parse(target).map_err(|e| CaptureError::NavigationFailed(format!("Invalid URL {target}: {e}")))?;

        let mut session = self.launch().await?;

        let page = match session.browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                self.close(session).await;
                return Err(CaptureError::PageError(e.to_string()));
            }
        };

        if let Err(e) = Self::navigate(&page, target).await {
            session.page = Some(page);
            self.close(session).await;
            return Err(e);
        }

        session.page = Some(page);
        Ok(session)
    }

    async fn render(&self, session: &mut ChromeSession) -> Result<Vec<u8>, CaptureError> {
        let page = session
            .page
            .as_ref()
            .ok_or_else(|| CaptureError::RenderFailed("session has no page".to_string()))?;

        // Visible viewport only, not the full page.
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        let png_data = page
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::RenderFailed(e.to_string()))?;

        self.convert_image_format(png_data)
    }

    async fn close(&self, mut session: ChromeSession) {
        if let Some(page) = session.page.take() {
            let _ = page.close().await;
        }

        if let Err(e) = session.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = session.browser.wait().await;
        // Dropping the session stops the handler and removes the profile.
    }
}
