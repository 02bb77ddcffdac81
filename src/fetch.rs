//! Async HTTP client for the API-mode harvesters.
//!
//! Not a browser, just a reqwest wrapper with browser-emulating headers, an
//! optional proxy fixed at construction, and a bounded retry loop with
//! jittered exponential backoff. Compression negotiation is left to
//! reqwest's gzip/deflate support.

use crate::error::Error;
use crate::request::ProxySpec;
use anyhow::{bail, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/110.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Retry and timeout policy for one client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    /// Total tries per URL, first attempt included.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// HTTP client shared by one harvest call.
#[derive(Clone, Debug)]
pub struct FetchClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Build a client with the fixed browser header set and an optional
    /// proxy. Proxy problems surface as [`Error::InvalidParameter`] so they
    /// abort before any request goes out.
    pub fn new(config: FetchConfig, proxy: Option<&ProxySpec>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(BROWSER_UA)
            .default_headers(headers)
            .gzip(true)
            .deflate(true);

        if let Some(spec) = proxy {
            let proxy = reqwest::Proxy::all(spec.url()).map_err(|e| {
                Error::InvalidParameter(format!("proxy {}: {e}", spec.url()))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;
        Ok(Self { client, config })
    }

    /// GET a URL and return its body, retrying transport errors and
    /// retryable statuses up to the configured budget.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..self.config.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_delay(attempt - 1)).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                warn!("body read failed for {url} (attempt {attempt}): {e}");
                                last_err = Some(e.into());
                                continue;
                            }
                        }
                    }
                    if is_retryable_status(status) {
                        warn!("retryable status {status} for {url} (attempt {attempt})");
                        last_err = Some(anyhow::anyhow!("status {status} for {url}"));
                        continue;
                    }
                    bail!("status {status} for {url}");
                }
                Err(e) => {
                    warn!("request failed for {url} (attempt {attempt}): {e}");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("no attempts configured for {url}")))
    }

    /// Exponential backoff with ±25% jitter, capped at `max_backoff`.
    fn backoff_delay(&self, exhausted_attempts: u32) -> Duration {
        let base = self.config.initial_backoff.as_millis() as u64;
        let cap = self.config.max_backoff.as_millis() as u64;
        let delay = base.saturating_mul(2u64.saturating_pow(exhausted_attempts)).min(cap);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((delay as f64 * jitter) as u64)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504 | 520..=527)
}
