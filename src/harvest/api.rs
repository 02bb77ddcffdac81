//! API-mode harvesting: hit the backends' paging endpoints directly.
//!
//! The two strategies are deliberately different. Bing pages forward until
//! the stream repeats itself; Baidu asks how much exists, then fans batches
//! out over a bounded worker pool. Do not unify them.

use super::dedup::UrlAccumulator;
use crate::cipher;
use crate::fetch::FetchClient;
use crate::query::encode_keywords;
use futures::StreamExt;
use regex::Regex;
use tracing::{debug, warn};

pub const BING_ASYNC_ENDPOINT: &str = "https://www.bing.com/images/async";
pub const BAIDU_ACJSON_ENDPOINT: &str = "https://image.baidu.com/search/acjson";

/// Fixed acjson parameter block, shared by the probe and every batch.
const BAIDU_QUERY_PREFIX: &str =
    "tn=resultjson_com&ipn=rj&ct=201326592&lm=7&fp=result&ie=utf-8&oe=utf-8&st=-1";

// ─── Tuning ─────────────────────────────────────────────────────────────────

/// Knobs for the API strategies.
#[derive(Debug, Clone)]
pub struct ApiTuning {
    /// Results requested per Bing page.
    pub page_size: usize,
    /// Results requested per Baidu batch.
    pub batch_size: usize,
    /// Concurrent Baidu batch fetches.
    pub workers: usize,
    /// Multiplier on the Baidu work target, compensating for dead entries.
    pub overfetch: usize,
}

impl Default for ApiTuning {
    fn default() -> Self {
        Self {
            page_size: 35,
            batch_size: 30,
            workers: 5,
            overfetch: 2,
        }
    }
}

// ─── Bing: streaming pagination ─────────────────────────────────────────────

/// Page through Bing's async endpoint until it has nothing new to say.
///
/// The endpoint does not report a total; the stop signals are an empty page,
/// a page whose last URL repeats the last one collected, or target reached.
pub async fn harvest_bing_api(
    client: &FetchClient,
    endpoint: &str,
    keywords: &str,
    acc: &mut UrlAccumulator,
    tuning: &ApiTuning,
) {
    let encoded = encode_keywords(keywords);
    let target = acc.target();
    let mut collected: Vec<String> = Vec::new();
    let mut offset = 1usize;

    while collected.len() < target {
        let url = format!(
            "{endpoint}?q={encoded}&first={offset}&count={}",
            tuning.page_size
        );
        let body = match client.get_text(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("page fetch at offset {offset} failed: {e}, ending pagination");
                break;
            }
        };
        let batch = murl_matches(&body);
        if batch.is_empty() {
            debug!("empty page at offset {offset}, ending pagination");
            break;
        }
        if collected.last() == batch.last() {
            debug!("stream repeated itself at offset {offset}, ending pagination");
            break;
        }
        offset += batch.len();
        collected.extend(batch);
    }

    acc.offer_all(&collected);
}

/// Bing's async payload is HTML with entity-escaped JSON islands; a regex
/// over the escaped text is the reliable way in.
fn murl_matches(body: &str) -> Vec<String> {
    let re = Regex::new("murl&quot;:&quot;(.*?)&quot;").expect("murl regex is valid");
    re.captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect()
}

// ─── Baidu: probe, then concurrent batches ──────────────────────────────────

/// Probe the acjson endpoint for the total, then fetch an overfetched range
/// of batches through a bounded worker pool and truncate to the target.
pub async fn harvest_baidu_api(
    client: &FetchClient,
    endpoint: &str,
    keywords: &str,
    face_only: bool,
    acc: &mut UrlAccumulator,
    tuning: &ApiTuning,
) {
    let encoded = encode_keywords(keywords);
    let face = if face_only { 1 } else { 0 };
    let page_url = |pn: usize| {
        format!(
            "{endpoint}?{BAIDU_QUERY_PREFIX}&word={encoded}&queryWord={encoded}\
             &face={face}&pn={pn}&rn={}",
            tuning.batch_size
        )
    };

    let probe = match client.get_text(&page_url(0)).await {
        Ok(body) => body,
        Err(e) => {
            warn!("probe fetch failed: {e}, nothing harvested");
            return;
        }
    };
    let available = match parse_total(&probe) {
        Some(n) => n,
        None => {
            warn!("probe response carried no listNum, nothing harvested");
            return;
        }
    };

    let target = acc.target().min(available);
    if target == 0 {
        return;
    }
    // Dead entries are common; fetch past the target and trim afterwards.
    let crawl = overfetch_span(target, tuning.overfetch, available);
    debug!("{available} available, fetching {crawl} toward a target of {target}");

    let batches = (0..crawl).step_by(tuning.batch_size.max(1));
    let results: Vec<Vec<String>> = futures::stream::iter(batches.map(|pn| {
        let url = page_url(pn);
        async move {
            match client.get_text(&url).await {
                Ok(body) => parse_batch(&body),
                Err(e) => {
                    warn!("batch at pn={pn} failed: {e}, contributing nothing");
                    Vec::new()
                }
            }
        }
    }))
    .buffer_unordered(tuning.workers.max(1))
    .collect()
    .await;

    let mut harvested: Vec<String> = results.into_iter().flatten().collect();
    harvested.truncate(target);
    acc.offer_all(&harvested);
}

/// Over-fetch window: `overfetch` times the target, clamped to what the
/// backend reports available. Both inputs can be remote- or caller-chosen,
/// so the multiply saturates instead of overflowing.
fn overfetch_span(target: usize, overfetch: usize, available: usize) -> usize {
    target.saturating_mul(overfetch).min(available)
}

/// Acjson bodies carry stray `\'` escapes that no strict JSON parser
/// accepts; strip them before parsing.
fn sanitize(body: &str) -> String {
    body.replace(r"\'", "")
}

fn parse_total(body: &str) -> Option<usize> {
    let value: serde_json::Value = serde_json::from_str(&sanitize(body)).ok()?;
    value.get("listNum")?.as_u64().map(|n| n as usize)
}

fn parse_batch(body: &str) -> Vec<String> {
    let value: serde_json::Value = match serde_json::from_str(&sanitize(body)) {
        Ok(value) => value,
        Err(e) => {
            debug!("unparseable batch payload: {e}");
            return Vec::new();
        }
    };
    let Some(entries) = value.get("data").and_then(|d| d.as_array()) else {
        return Vec::new();
    };
    entries.iter().filter_map(extract_entry_url).collect()
}

/// An entry's `objURL` is masked by the substitution cipher and may wrap the
/// real URL in a forwarding parameter. Entries without one sometimes carry a
/// two-element `replaceUrl` pair whose second element is already plain.
fn extract_entry_url(entry: &serde_json::Value) -> Option<String> {
    if let Some(masked) = entry.get("objURL").and_then(|v| v.as_str()) {
        let decoded = cipher::percent_decode(&cipher::deobfuscate_url(masked));
        return Some(cipher::unwrap_forwarded(&decoded));
    }
    let replace = entry.get("replaceUrl")?.as_array()?;
    if replace.len() != 2 {
        return None;
    }
    replace[1].get("ObjURL")?.as_str().map(|s| s.to_string())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murl_matches_extracts_escaped_json() {
        let body = r#"<a m="{&quot;murl&quot;:&quot;https://cdn.example/a.jpg&quot;}"></a>
                      <a m="{&quot;murl&quot;:&quot;https://cdn.example/b.jpg&quot;}"></a>"#;
        assert_eq!(
            murl_matches(body),
            vec!["https://cdn.example/a.jpg", "https://cdn.example/b.jpg"]
        );
    }

    #[test]
    fn test_murl_matches_empty_body() {
        assert!(murl_matches("<html>no tiles here</html>").is_empty());
    }

    #[test]
    fn test_overfetch_span_clamps_and_saturates() {
        assert_eq!(overfetch_span(3, 2, 100), 6);
        assert_eq!(overfetch_span(60, 2, 100), 100);
        assert_eq!(overfetch_span(0, 2, 100), 0);
        // A caller can pass any max_urls and listNum is remote data; the
        // product must clamp, never panic.
        assert_eq!(overfetch_span(usize::MAX, 2, 50), 50);
        assert_eq!(overfetch_span(usize::MAX, 2, usize::MAX), usize::MAX);
    }

    #[test]
    fn test_sanitize_strips_bad_escapes() {
        assert_eq!(sanitize(r#"{"a":"it\'s"}"#), r#"{"a":"its"}"#);
    }

    #[test]
    fn test_parse_total_reads_list_num() {
        assert_eq!(parse_total(r#"{"listNum": 1200, "data": []}"#), Some(1200));
        assert_eq!(parse_total(r#"{"data": []}"#), None);
        assert_eq!(parse_total("not json"), None);
    }

    #[test]
    fn test_extract_entry_prefers_obj_url() {
        // token layer then character layer recover the plain URL
        let entry = serde_json::json!({
            "objURL": "ipprf_z2C$qAzdH3FAzdH3Ft42_z&e3Bjxw4rsj_z&e3Bv54AzdH3Fri5p5-8_z&e3B3r2"
        });
        assert_eq!(
            extract_entry_url(&entry).as_deref(),
            Some("https://img.example.com/photo-1.jpg")
        );
    }

    #[test]
    fn test_extract_entry_replace_url_pair() {
        let entry = serde_json::json!({
            "replaceUrl": [
                {"ObjURL": "https://old.example/1.jpg"},
                {"ObjURL": "https://new.example/1.jpg"}
            ]
        });
        assert_eq!(
            extract_entry_url(&entry).as_deref(),
            Some("https://new.example/1.jpg")
        );
    }

    #[test]
    fn test_extract_entry_rejects_odd_replace_url() {
        let single = serde_json::json!({
            "replaceUrl": [{"ObjURL": "https://only.example/1.jpg"}]
        });
        assert_eq!(extract_entry_url(&single), None);

        let empty = serde_json::json!({"thumbURL": "https://thumb.example/1.jpg"});
        assert_eq!(extract_entry_url(&empty), None);
    }

    #[test]
    fn test_parse_batch_mixed_entries() {
        let body = r#"{"listNum": 3, "data": [
            {"replaceUrl": [{"ObjURL": "https://a.example/old.jpg"},
                            {"ObjURL": "https://a.example/new.jpg"}]},
            {"fromPageTitle": "no url here"},
            {}
        ]}"#;
        assert_eq!(parse_batch(body), vec!["https://a.example/new.jpg"]);
    }

    #[test]
    fn test_parse_batch_tolerates_garbage() {
        assert!(parse_batch("<html>rate limited</html>").is_empty());
        assert!(parse_batch(r#"{"listNum": 5}"#).is_empty());
    }
}
