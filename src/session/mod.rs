//! Rendering-session abstraction for render-mode harvesting.
//!
//! Defines the `Browser` and `SearchSession` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide). Element operations
//! address elements by `(selector, index)` and re-resolve them on every
//! call, so a page that mutates between calls shifts positions instead of
//! leaving dangling handles.

pub mod chromium;

use crate::request::ProxySpec;
use async_trait::async_trait;
use std::time::Duration;

/// Errors raised while launching or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The element set changed between resolution and use. Retryable.
    #[error("stale element: {0}")]
    Stale(String),

    #[error("element interaction failed: {0}")]
    Interaction(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

/// Launch options the harvester controls. Process lifetime, profile and
/// everything else stays with the implementation.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    /// Window size in pixels. Oversized windows make lazy galleries
    /// materialize without scrolling.
    pub window: (u32, u32),
    pub proxy: Option<ProxySpec>,
    /// Budget for the initial navigation.
    pub nav_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1920, 1080),
            proxy: None,
            nav_timeout: Duration::from_secs(30),
        }
    }
}

/// A browser engine that can open search sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh session (exclusively owned by one harvest call).
    async fn new_session(
        &self,
        opts: &SessionOptions,
    ) -> Result<Box<dyn SearchSession>, SessionError>;
}

/// One live result page.
#[async_trait]
pub trait SearchSession: Send {
    /// Navigate to the query URL.
    async fn open(&mut self, url: &str) -> Result<(), SessionError>;

    /// Number of elements currently matching `selector` in the active scope.
    async fn element_count(&self, selector: &str) -> Result<usize, SessionError>;

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool, SessionError>;

    async fn is_enabled(&self, selector: &str, index: usize) -> Result<bool, SessionError>;

    /// Rendered text of the element (empty when gone).
    async fn text(&self, selector: &str, index: usize) -> Result<String, SessionError>;

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Primary activation path (trusted input event).
    async fn click(&self, selector: &str, index: usize) -> Result<(), SessionError>;

    /// Forced activation path (script dispatch), for elements the primary
    /// path cannot reach.
    async fn click_via_script(&self, selector: &str, index: usize) -> Result<(), SessionError>;

    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<(), SessionError>;

    /// Scroll the top document to its bottom.
    async fn scroll_to_bottom(&self) -> Result<(), SessionError>;

    /// Wait until `selector` matches at least one element. Returns `false`
    /// on timeout instead of failing.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, SessionError>;

    /// Full HTML of the top document.
    async fn page_html(&self) -> Result<String, SessionError>;

    /// Scope subsequent element operations to the iframe at
    /// `(selector, index)`. Single level; entering again replaces the scope.
    async fn enter_frame(&mut self, selector: &str, index: usize) -> Result<(), SessionError>;

    /// Return to the top document.
    async fn exit_frame(&mut self) -> Result<(), SessionError>;

    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// A no-op browser used when only API mode is wired.
pub struct NoopBrowser;

#[async_trait]
impl Browser for NoopBrowser {
    async fn new_session(
        &self,
        _opts: &SessionOptions,
    ) -> Result<Box<dyn SearchSession>, SessionError> {
        Err(SessionError::Launch(
            "no browser wired; api mode only".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_browser_refuses_sessions() {
        let err = NoopBrowser
            .new_session(&SessionOptions::default())
            .await
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("no browser wired"));
    }

    #[test]
    fn test_default_options() {
        let opts = SessionOptions::default();
        assert!(opts.headless);
        assert_eq!(opts.window, (1920, 1080));
        assert!(opts.proxy.is_none());
    }
}
