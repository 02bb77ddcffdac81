//! Keyword-to-URL harvesting across the supported image search backends.

pub mod api;
pub mod dedup;
pub mod render;

use crate::error::Error;
use crate::fetch::{FetchClient, FetchConfig};
use crate::request::{Backend, FetchMode, SearchRequest};
use crate::session::{Browser, SessionOptions};
use api::ApiTuning;
use dedup::UrlAccumulator;
use render::RenderTuning;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Unbounded requests resolve to this many URLs.
pub const DEFAULT_MAX_URLS: usize = 10_000;

/// Baidu's gallery is harvested without scrolling; an oversized viewport
/// makes the page materialize enough tiles in one shot.
const BAIDU_RENDER_WINDOW: (u32, u32) = (10_000, 7_500);

const DEFAULT_RENDER_WINDOW: (u32, u32) = (1920, 1080);

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub headless: bool,
    pub render: RenderTuning,
    pub api: ApiTuning,
    pub fetch: FetchConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            headless: true,
            render: RenderTuning::default(),
            api: ApiTuning::default(),
            fetch: FetchConfig::default(),
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Outcome of one harvest call. `urls` is ordered, deduplicated, and capped
/// at `requested`; `distinct_seen` counts every distinct candidate the
/// backend offered, including those past the cap.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub urls: Vec<String>,
    pub requested: usize,
    pub distinct_seen: usize,
}

impl HarvestReport {
    pub fn delivered(&self) -> usize {
        self.urls.len()
    }
}

// ─── Harvester ──────────────────────────────────────────────────────────────

/// Orchestrates one harvest per call: validates the request, builds the
/// query, and dispatches to the backend strategy.
pub struct Harvester {
    browser: Arc<dyn Browser>,
    config: HarvestConfig,
}

impl Harvester {
    pub fn new(browser: Arc<dyn Browser>, config: HarvestConfig) -> Self {
        Self { browser, config }
    }

    pub async fn harvest(&self, request: &SearchRequest) -> Result<HarvestReport, Error> {
        let target = if request.max_urls == 0 {
            DEFAULT_MAX_URLS
        } else {
            request.max_urls
        };

        // Validation runs before any I/O. Google has no paging endpoint, so
        // api mode is refused at dispatch; the query build surfaces bad
        // parameters for both modes.
        if request.backend == Backend::Google && request.mode == FetchMode::Api {
            return Err(Error::UnsupportedMode {
                backend: request.backend,
                mode: request.mode,
            });
        }
        let query_url = request.backend.build_query(request)?;

        info!(
            "harvesting up to {target} urls for {:?} from {} ({} mode)",
            request.keywords, request.backend, request.mode
        );

        let mut acc = UrlAccumulator::new(target);
        match request.mode {
            FetchMode::Render => self.run_render(request, &query_url, &mut acc).await?,
            FetchMode::Api => self.run_api(request, &mut acc).await?,
        }

        let distinct_seen = acc.distinct_seen();
        let urls = acc.finish();
        info!(
            "delivered {} of {target} requested, {distinct_seen} distinct seen",
            urls.len()
        );
        Ok(HarvestReport {
            urls,
            requested: target,
            distinct_seen,
        })
    }

    async fn run_render(
        &self,
        request: &SearchRequest,
        query_url: &str,
        acc: &mut UrlAccumulator,
    ) -> Result<(), Error> {
        let window = match request.backend {
            Backend::Baidu => BAIDU_RENDER_WINDOW,
            _ => DEFAULT_RENDER_WINDOW,
        };
        let opts = SessionOptions {
            headless: self.config.headless,
            window,
            proxy: request.proxy.clone(),
            ..SessionOptions::default()
        };

        let mut session = self.browser.new_session(&opts).await?;
        if let Err(e) = session.open(query_url).await {
            let _ = session.close().await;
            return Err(e.into());
        }

        match request.backend {
            Backend::Google => {
                render::harvest_google(session.as_mut(), acc, &self.config.render).await
            }
            Backend::Bing => {
                render::harvest_bing(session.as_mut(), acc, &self.config.render).await
            }
            Backend::Baidu => {
                render::harvest_baidu(session.as_mut(), acc, &self.config.render).await
            }
        }

        if let Err(e) = session.close().await {
            debug!("session close failed: {e}");
        }
        Ok(())
    }

    async fn run_api(&self, request: &SearchRequest, acc: &mut UrlAccumulator) -> Result<(), Error> {
        let client = FetchClient::new(self.config.fetch.clone(), request.proxy.as_ref())?;
        match request.backend {
            Backend::Bing => {
                api::harvest_bing_api(
                    &client,
                    api::BING_ASYNC_ENDPOINT,
                    &request.keywords,
                    acc,
                    &self.config.api,
                )
                .await
            }
            Backend::Baidu => {
                api::harvest_baidu_api(
                    &client,
                    api::BAIDU_ACJSON_ENDPOINT,
                    &request.keywords,
                    request.face_only,
                    acc,
                    &self.config.api,
                )
                .await
            }
            Backend::Google => {
                return Err(Error::UnsupportedMode {
                    backend: request.backend,
                    mode: request.mode,
                })
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
