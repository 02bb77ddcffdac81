//! Chromium-backed search sessions via chromiumoxide.

use super::{Browser, SearchSession, SessionError, SessionOptions};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Poll interval for wait loops.
const POLL: Duration = Duration::from_millis(100);

/// Find a Chromium-family executable.
pub fn find_browser() -> Option<PathBuf> {
    // 1. FORAGE_BROWSER env
    if let Ok(p) = std::env::var("FORAGE_BROWSER") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium launcher. One launched browser per session, so a harvest call
/// owns its process exclusively.
pub struct ChromiumBrowser {
    executable: PathBuf,
}

impl ChromiumBrowser {
    pub fn new() -> Result<Self, SessionError> {
        let executable = find_browser().ok_or_else(|| {
            SessionError::Launch(
                "no chromium executable found; set FORAGE_BROWSER".to_string(),
            )
        })?;
        Ok(Self { executable })
    }

    pub fn with_executable(executable: PathBuf) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_session(
        &self,
        opts: &SessionOptions,
    ) -> Result<Box<dyn SearchSession>, SessionError> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(self.executable.clone())
            .arg(format!("--window-size={},{}", opts.window.0, opts.window.1))
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if opts.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(proxy) = &opts.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.url()));
        }

        let config = builder
            .build()
            .map_err(|e| SessionError::Launch(format!("browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // Drive the CDP event stream for the life of the session.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(format!("new page: {e}")))?;

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            nav_timeout: opts.nav_timeout,
            frame: None,
        }))
    }
}

/// One Chromium page.
pub struct ChromiumSession {
    browser: CdpBrowser,
    page: Page,
    handler_task: JoinHandle<()>,
    nav_timeout: Duration,
    /// `Some((selector, index))` while scoped inside an iframe. Frame-scoped
    /// operations go through script evaluation, which reaches same-origin
    /// frames only; unreachable frames read as empty, never as errors.
    frame: Option<(String, usize)>,
}

impl ChromiumSession {
    async fn resolve(&self, selector: &str, index: usize) -> Result<Element, SessionError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(classify)?;
        elements
            .into_iter()
            .nth(index)
            .ok_or_else(|| SessionError::Stale(format!("{selector}[{index}] is gone")))
    }

    async fn eval_json(&self, script: String) -> Result<serde_json::Value, SessionError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn call_bool_fn(
        &self,
        selector: &str,
        index: usize,
        func: &str,
    ) -> Result<bool, SessionError> {
        let el = self.resolve(selector, index).await?;
        let ret = el.call_js_fn(func, false).await.map_err(classify)?;
        Ok(ret
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl SearchSession for ChromiumSession {
    async fn open(&mut self, url: &str) -> Result<(), SessionError> {
        let nav = tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await;
        match nav {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Navigation(e.to_string())),
            Err(_) => Err(SessionError::Navigation(format!(
                "timed out opening {url}"
            ))),
        }
    }

    async fn element_count(&self, selector: &str) -> Result<usize, SessionError> {
        if let Some(frame) = &self.frame {
            let v = self.eval_json(frame_count_js(frame, selector)).await?;
            return Ok(v.as_u64().unwrap_or(0) as usize);
        }
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            Err(e) => match classify(e) {
                // No matching nodes reads as zero, not as a failure.
                SessionError::Stale(_) => Ok(0),
                other => Err(other),
            },
        }
    }

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool, SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(
                frame,
                selector,
                index,
                "const style = (doc.defaultView || window).getComputedStyle(el); \
                 if (style.display === 'none' || style.visibility === 'hidden') return false; \
                 const rect = el.getBoundingClientRect(); \
                 return rect.width > 0 && rect.height > 0;",
            );
            let v = self.eval_json(script).await?;
            return Ok(v.as_bool().unwrap_or(false));
        }
        self.call_bool_fn(
            selector,
            index,
            "function() { \
               const style = window.getComputedStyle(this); \
               if (style.display === 'none' || style.visibility === 'hidden') return false; \
               const rect = this.getBoundingClientRect(); \
               return rect.width > 0 && rect.height > 0; \
             }",
        )
        .await
    }

    async fn is_enabled(&self, selector: &str, index: usize) -> Result<bool, SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(frame, selector, index, "return !el.disabled;");
            let v = self.eval_json(script).await?;
            return Ok(v.as_bool().unwrap_or(false));
        }
        self.call_bool_fn(selector, index, "function() { return !this.disabled; }")
            .await
    }

    async fn text(&self, selector: &str, index: usize) -> Result<String, SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(
                frame,
                selector,
                index,
                "return el.innerText || el.textContent || '';",
            );
            let v = self.eval_json(script).await?;
            return Ok(v.as_str().unwrap_or_default().to_string());
        }
        let el = self.resolve(selector, index).await?;
        let text = el.inner_text().await.map_err(classify)?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(
                frame,
                selector,
                index,
                &format!("return el.getAttribute({});", js_str(name)),
            );
            let v = self.eval_json(script).await?;
            return Ok(v.as_str().map(|s| s.to_string()));
        }
        let el = self.resolve(selector, index).await?;
        el.attribute(name).await.map_err(classify)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), SessionError> {
        if self.frame.is_some() {
            // Trusted input events cannot cross into frames here; the
            // script path is the only activation available.
            return self.click_via_script(selector, index).await;
        }
        let el = self.resolve(selector, index).await?;
        el.click().await.map_err(classify)?;
        Ok(())
    }

    async fn click_via_script(&self, selector: &str, index: usize) -> Result<(), SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(frame, selector, index, "el.click(); return true;");
            let v = self.eval_json(script).await?;
            if v.as_bool() == Some(true) {
                return Ok(());
            }
            return Err(SessionError::Stale(format!(
                "{selector}[{index}] unreachable in frame"
            )));
        }
        let el = self.resolve(selector, index).await?;
        el.call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<(), SessionError> {
        if let Some(frame) = &self.frame {
            let script = frame_element_js(
                frame,
                selector,
                index,
                "el.scrollIntoView({block: 'center'}); return true;",
            );
            self.eval_json(script).await?;
            return Ok(());
        }
        let el = self.resolve(selector, index).await?;
        el.scroll_into_view().await.map_err(classify)?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), SessionError> {
        self.eval_json("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.element_count(selector).await? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn page_html(&self) -> Result<String, SessionError> {
        let v = self
            .eval_json("document.documentElement.outerHTML".to_string())
            .await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn enter_frame(&mut self, selector: &str, index: usize) -> Result<(), SessionError> {
        // Verify the frame element exists before scoping to it.
        self.frame = None;
        self.resolve(selector, index).await?;
        self.frame = Some((selector.to_string(), index));
        Ok(())
    }

    async fn exit_frame(&mut self) -> Result<(), SessionError> {
        self.frame = None;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        let ChromiumSession {
            browser,
            page,
            handler_task,
            ..
        } = *self;
        let _ = page.close().await;
        drop(browser);
        handler_task.abort();
        Ok(())
    }
}

/// Map driver errors onto the session error kinds the harvester retries on.
/// chromiumoxide surfaces stale nodes as textual CDP errors, so this sniffs
/// the message the same way the HTTP fallback paths do.
fn classify(e: impl std::fmt::Display) -> SessionError {
    let msg = e.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("could not find")
        || lower.contains("not be found")
        || lower.contains("not found")
        || lower.contains("no node")
    {
        SessionError::Stale(msg)
    } else if lower.contains("timeout") || lower.contains("timed out") {
        SessionError::Timeout(msg)
    } else {
        SessionError::Interaction(msg)
    }
}

/// Quote a string for embedding in generated JavaScript.
fn js_str(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn frame_doc_prelude(frame: &(String, usize)) -> String {
    format!(
        "const frames = document.querySelectorAll({sel}); \
         const frame = frames[{idx}]; \
         if (!frame) return null; \
         let doc = null; \
         try {{ doc = frame.contentDocument; }} catch (err) {{ return null; }} \
         if (!doc) return null;",
        sel = js_str(&frame.0),
        idx = frame.1
    )
}

fn frame_count_js(frame: &(String, usize), selector: &str) -> String {
    format!(
        "(() => {{ {prelude} return doc.querySelectorAll({sel}).length; }})()",
        prelude = frame_doc_prelude(frame),
        sel = js_str(selector)
    )
}

fn frame_element_js(frame: &(String, usize), selector: &str, index: usize, expr: &str) -> String {
    format!(
        "(() => {{ {prelude} const el = doc.querySelectorAll({sel})[{idx}]; \
         if (!el) return null; {expr} }})()",
        prelude = frame_doc_prelude(frame),
        sel = js_str(selector),
        idx = index,
        expr = expr
    )
}
