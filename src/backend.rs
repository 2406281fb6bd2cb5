use crate::CaptureError;
use async_trait::async_trait;

/// The browser seen from the pipeline: open a page, render it, close it.
///
/// Every call may fail. A session returned by [`open`](CaptureBackend::open)
/// is exclusive to one attempt and is always handed back to
/// [`close`](CaptureBackend::close), whatever the outcome of rendering.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    type Session: Send;

    /// Start a fresh session and navigate it to `target`, returning once the
    /// document is parsed, the network has settled and the body is present.
    ///
    /// The returned future may be dropped before it completes when an attempt
    /// deadline expires; anything acquired up to that point must be released
    /// on drop.
    async fn open(&self, target: &str) -> Result<Self::Session, CaptureError>;

    /// Produce the artifact bytes for the page held by `session`.
    async fn render(&self, session: &mut Self::Session) -> Result<Vec<u8>, CaptureError>;

    /// Release every resource held by `session`. Must not fail.
    async fn close(&self, session: Self::Session);
}
