//! Render-mode harvesting: drive a live results page and read URLs off it.
//!
//! Each backend gets its own state machine. Every wait is bounded and every
//! failure past the initial navigation shrinks the result instead of
//! aborting it.

use super::dedup::UrlAccumulator;
use crate::session::{SearchSession, SessionError};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

// ─── Selectors ──────────────────────────────────────────────────────────────

const GOOGLE_THUMBS: &str = "img.rg_i, img.Q4LuWd";
const GOOGLE_DETAIL: &str = "img.n3VNCb";
const GOOGLE_DETAIL_READY: &str = r#"img.n3VNCb[src^="http"]"#;
const GOOGLE_LOAD_MORE: &str = ".mye4qd, .YstHxe";
const BING_TILES: &str = ".iusc";
const BING_SEE_MORE: &str = ".btn_seemore";
const BAIDU_TILES: &str = ".imgitem";

/// Consent buttons are matched on label substrings, case-insensitively.
const CONSENT_LABELS: [&str; 2] = ["accept", "agree"];

// ─── Tuning ─────────────────────────────────────────────────────────────────

/// Timing knobs for the render state machines.
#[derive(Debug, Clone)]
pub struct RenderTuning {
    /// Pause before the consent scan runs.
    pub consent_probe: Duration,
    /// Pause after dismissing a consent dialog.
    pub consent_settle: Duration,
    /// Pause between scroll rounds on Google.
    pub scroll_settle: Duration,
    /// Pause between growth rounds on Bing.
    pub gallery_settle: Duration,
    /// Pause after the initial navigation on Bing and Baidu.
    pub page_settle: Duration,
    /// Pause after scrolling a thumbnail into view.
    pub focus_settle: Duration,
    /// Upper bound on waiting for a detail image to resolve.
    pub detail_wait: Duration,
    /// Hard cap on scroll/growth rounds.
    pub max_scroll_rounds: usize,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            consent_probe: Duration::from_secs(1),
            consent_settle: Duration::from_secs(2),
            scroll_settle: Duration::from_secs(2),
            gallery_settle: Duration::from_secs(3),
            page_settle: Duration::from_secs(10),
            focus_settle: Duration::from_millis(300),
            detail_wait: Duration::from_secs(10),
            max_scroll_rounds: 50,
        }
    }
}

// ─── Google ─────────────────────────────────────────────────────────────────

/// Google images: dismiss consent, grow the thumbnail gallery, then open
/// each thumbnail and read the full-size source off the detail pane.
pub async fn harvest_google(
    session: &mut dyn SearchSession,
    acc: &mut UrlAccumulator,
    tuning: &RenderTuning,
) {
    dismiss_consent(session, tuning).await;
    grow_gallery(session, acc.target(), tuning).await;
    extract_details(session, acc, tuning).await;
}

async fn dismiss_consent(session: &mut dyn SearchSession, tuning: &RenderTuning) {
    tokio::time::sleep(tuning.consent_probe).await;
    match scan_for_consent(session).await {
        Ok(true) => {
            debug!("consent control dismissed");
            tokio::time::sleep(tuning.consent_settle).await;
        }
        Ok(false) => debug!("no consent control present"),
        Err(e) => debug!("consent scan failed: {e}, continuing"),
    }
}

/// Look for an accept/agree button in the top document, then inside any
/// iframe whose id or src mentions consent.
async fn scan_for_consent(session: &mut dyn SearchSession) -> Result<bool, SessionError> {
    if click_consent_button(session).await? {
        return Ok(true);
    }

    let frames = session.element_count("iframe").await?;
    for idx in 0..frames {
        let id = session
            .attribute("iframe", idx, "id")
            .await?
            .unwrap_or_default();
        let src = session
            .attribute("iframe", idx, "src")
            .await?
            .unwrap_or_default();
        if !id.to_ascii_lowercase().contains("consent")
            && !src.to_ascii_lowercase().contains("consent")
        {
            continue;
        }
        session.enter_frame("iframe", idx).await?;
        let clicked = click_consent_button(session).await;
        session.exit_frame().await?;
        if clicked? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn click_consent_button(session: &mut dyn SearchSession) -> Result<bool, SessionError> {
    let buttons = session.element_count("button").await?;
    for idx in 0..buttons {
        if !session.is_visible("button", idx).await?
            || !session.is_enabled("button", idx).await?
        {
            continue;
        }
        let mut label = session.text("button", idx).await?;
        if let Some(aria) = session.attribute("button", idx, "aria-label").await? {
            label.push(' ');
            label.push_str(&aria);
        }
        let label = label.to_ascii_lowercase();
        if CONSENT_LABELS.iter().any(|probe| label.contains(probe)) {
            session.click("button", idx).await?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Scroll until the thumbnail count reaches the target, stops growing, or
/// the round cap is hit.
async fn grow_gallery(session: &mut dyn SearchSession, target: usize, tuning: &RenderTuning) {
    let mut previous = 0usize;
    for round in 0..tuning.max_scroll_rounds {
        let count = match session.element_count(GOOGLE_THUMBS).await {
            Ok(n) => n,
            Err(e) => {
                warn!("thumbnail count failed: {e}, stopping scroll loop");
                return;
            }
        };
        if count >= target {
            debug!("gallery holds {count} thumbnails after {round} round(s)");
            return;
        }
        if round > 0 && count == previous {
            debug!("gallery converged at {count} thumbnails, short of {target}");
            return;
        }
        previous = count;
        if let Err(e) = scroll_round(session, tuning).await {
            warn!("scroll round failed: {e}, stopping scroll loop");
            return;
        }
    }
    debug!("scroll round cap reached at {previous} thumbnails");
}

async fn scroll_round(
    session: &mut dyn SearchSession,
    tuning: &RenderTuning,
) -> Result<(), SessionError> {
    session.scroll_to_bottom().await?;
    tokio::time::sleep(tuning.scroll_settle).await;
    if let Some(idx) = first_interactive(session, GOOGLE_LOAD_MORE).await? {
        session.click(GOOGLE_LOAD_MORE, idx).await?;
        tokio::time::sleep(tuning.scroll_settle).await;
    }
    tokio::time::sleep(tuning.scroll_settle).await;
    Ok(())
}

async fn first_interactive(
    session: &mut dyn SearchSession,
    selector: &str,
) -> Result<Option<usize>, SessionError> {
    let count = session.element_count(selector).await?;
    for idx in 0..count {
        if session.is_visible(selector, idx).await? && session.is_enabled(selector, idx).await? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

/// Walk the gallery by index, activating each thumbnail and reading the
/// detail pane. Thumbnails are re-resolved on every touch; a handle cached
/// across a wait would go stale as the page mutates.
async fn extract_details(
    session: &mut dyn SearchSession,
    acc: &mut UrlAccumulator,
    tuning: &RenderTuning,
) {
    let mut idx = 0usize;
    loop {
        if acc.is_full() {
            return;
        }
        let count = match session.element_count(GOOGLE_THUMBS).await {
            Ok(n) => n,
            Err(e) => {
                warn!("thumbnail recount failed: {e}, stopping detail pass");
                return;
            }
        };
        if idx >= count {
            return;
        }
        if let Err(e) = inspect_thumbnail(session, acc, idx, tuning).await {
            debug!("thumbnail {idx} skipped: {e}");
        }
        idx += 1;
    }
}

async fn inspect_thumbnail(
    session: &mut dyn SearchSession,
    acc: &mut UrlAccumulator,
    idx: usize,
    tuning: &RenderTuning,
) -> Result<(), SessionError> {
    if !session.is_visible(GOOGLE_THUMBS, idx).await?
        || !session.is_enabled(GOOGLE_THUMBS, idx).await?
    {
        return Ok(());
    }
    session.scroll_into_view(GOOGLE_THUMBS, idx).await?;
    tokio::time::sleep(tuning.focus_settle).await;

    if !activate_thumbnail(session, idx).await {
        return Ok(());
    }

    if !session.wait_for(GOOGLE_DETAIL_READY, tuning.detail_wait).await? {
        debug!("thumbnail {idx}: detail image never resolved");
        return Ok(());
    }

    let detail_count = session.element_count(GOOGLE_DETAIL).await?;
    for d in 0..detail_count {
        if let Some(src) = session.attribute(GOOGLE_DETAIL, d, "src").await? {
            acc.offer(&src);
        }
    }
    Ok(())
}

/// Primary click, one retry on staleness, then the forced script path.
async fn activate_thumbnail(session: &mut dyn SearchSession, idx: usize) -> bool {
    for attempt in 0..2 {
        match session.click(GOOGLE_THUMBS, idx).await {
            Ok(()) => return true,
            Err(SessionError::Stale(_)) if attempt == 0 => continue,
            Err(e) => {
                debug!("thumbnail {idx}: primary activation failed: {e}");
                break;
            }
        }
    }
    match session.click_via_script(GOOGLE_THUMBS, idx).await {
        Ok(()) => true,
        Err(e) => {
            debug!("thumbnail {idx}: forced activation failed: {e}");
            false
        }
    }
}

// ─── Bing ───────────────────────────────────────────────────────────────────

/// Bing images: grow the tile gallery (scroll, then the "see more" button
/// once growth stalls), then parse every tile's metadata blob in one pass.
pub async fn harvest_bing(
    session: &mut dyn SearchSession,
    acc: &mut UrlAccumulator,
    tuning: &RenderTuning,
) {
    tokio::time::sleep(tuning.page_settle).await;

    let target = acc.target();
    let mut previous = 0usize;
    let mut stalls = 0u32;
    for _ in 0..tuning.max_scroll_rounds {
        let count = match session.element_count(BING_TILES).await {
            Ok(n) => n,
            Err(e) => {
                warn!("tile count failed: {e}, stopping growth loop");
                break;
            }
        };
        if count >= target {
            break;
        }
        if count > previous {
            stalls = 0;
            if let Err(e) = session.scroll_to_bottom().await {
                warn!("scroll failed: {e}, stopping growth loop");
                break;
            }
        } else {
            stalls += 1;
            if stalls >= 2 {
                debug!("gallery stalled at {count} tiles, short of {target}");
                break;
            }
            match first_interactive(session, BING_SEE_MORE).await {
                Ok(Some(idx)) => {
                    if let Err(e) = session.click(BING_SEE_MORE, idx).await {
                        debug!("see-more click failed: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("see-more lookup failed: {e}, stopping growth loop");
                    break;
                }
            }
        }
        previous = count;
        tokio::time::sleep(tuning.gallery_settle).await;
    }

    match session.page_html().await {
        Ok(html) => acc.offer_all(bing_tile_urls(&html)),
        Err(e) => warn!("page read failed: {e}, nothing harvested"),
    }
}

/// Each `.iusc` tile carries a JSON blob in its `m` attribute whose `murl`
/// member is the full-size image URL.
fn bing_tile_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let tiles = match Selector::parse(BING_TILES) {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let mut urls = Vec::new();
    for tile in document.select(&tiles) {
        let Some(meta) = tile.value().attr("m") else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(meta) {
            Ok(value) => {
                if let Some(murl) = value.get("murl").and_then(|v| v.as_str()) {
                    urls.push(murl.to_string());
                }
            }
            Err(e) => debug!("unparseable tile metadata: {e}"),
        }
    }
    urls
}

// ─── Baidu ──────────────────────────────────────────────────────────────────

/// Baidu images: the session is opened with an oversized window so the
/// gallery materializes without scrolling; one settle, one parse.
pub async fn harvest_baidu(
    session: &mut dyn SearchSession,
    acc: &mut UrlAccumulator,
    tuning: &RenderTuning,
) {
    tokio::time::sleep(tuning.page_settle).await;
    match session.page_html().await {
        Ok(html) => acc.offer_all(baidu_tile_urls(&html)),
        Err(e) => warn!("page read failed: {e}, nothing harvested"),
    }
}

fn baidu_tile_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let tiles = match Selector::parse(BAIDU_TILES) {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    document
        .select(&tiles)
        .filter_map(|tile| tile.value().attr("data-objurl"))
        .filter(|url| !url.is_empty())
        .map(|url| url.to_string())
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
