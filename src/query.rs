//! Per-backend search-URL builders.
//!
//! Pure string assembly: no I/O, no clock, no randomness. The same request
//! always yields a byte-identical URL, so these are trivially testable and
//! safely reusable across retries.

use crate::error::Error;
use crate::request::{Backend, ImageKind, SearchRequest};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters and `/` is escaped.
/// Spaces become `%20`, multi-byte keywords become UTF-8 escapes.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode a keyword phrase for embedding in a query string.
pub(crate) fn encode_keywords(keywords: &str) -> String {
    utf8_percent_encode(keywords, QUERY).to_string()
}

/// Fixed Baidu color codes for the `ic` parameter.
fn baidu_color_code(color: &str) -> Option<u32> {
    let code = match color {
        "white" => 1024,
        "bw" => 2048,
        "black" => 512,
        "pink" => 64,
        "blue" => 16,
        "red" => 1,
        "yellow" => 2,
        "purple" => 32,
        "green" => 4,
        "teal" => 8,
        "orange" => 256,
        "brown" => 128,
        _ => return None,
    };
    Some(code)
}

impl Backend {
    /// Build the result-page URL for `req` on this backend.
    ///
    /// Fails with [`Error::InvalidParameter`] before any network activity
    /// when an option does not fit the backend's filter grammar.
    pub fn build_query(&self, req: &SearchRequest) -> Result<String, Error> {
        match self {
            Backend::Google => Ok(google_query_url(req)),
            Backend::Bing => Ok(bing_query_url(req)),
            Backend::Baidu => baidu_query_url(req),
        }
    }
}

fn google_image_kind(kind: ImageKind) -> &'static str {
    match kind {
        ImageKind::Photo => "photo",
        ImageKind::Clipart => "clipart",
        ImageKind::LineDrawing => "lineart",
        ImageKind::Animated => "animated",
    }
}

/// `tbm=isch` result page with `tbs` filter fragments.
fn google_query_url(req: &SearchRequest) -> String {
    let mut url = format!(
        "https://www.google.com/search?tbm=isch&hl=en&q={}",
        encode_keywords(&req.keywords)
    );
    url.push_str(if req.safe_search { "&safe=on" } else { "&safe=off" });

    // The tbs collector is always appended, even when no filter is active.
    let mut filters = String::from("&tbs=");
    if let Some(color) = &req.color {
        let color = color.to_ascii_lowercase();
        if color == "bw" {
            filters.push_str("ic:gray%2C");
        } else {
            filters.push_str(&format!("ic:specific%2Cisc:{color}%2C"));
        }
    }
    if let Some(kind) = req.image_kind {
        filters.push_str(&format!("itp:{}", google_image_kind(kind)));
    }
    if req.face_only {
        filters.push_str("itp:face");
    }
    url.push_str(&filters);
    url
}

/// Result page with `qft` filter fragments.
fn bing_query_url(req: &SearchRequest) -> String {
    let mut url = format!(
        "https://www.bing.com/images/search?&q={}",
        encode_keywords(&req.keywords)
    );

    let mut filters = String::from("&qft=");
    if req.face_only {
        filters.push_str("+filterui:face-face");
    }
    // Bing takes the kind token verbatim; only Google renames one.
    if let Some(kind) = req.image_kind {
        filters.push_str(&format!("+filterui:photo-{kind}"));
    }
    if let Some(color) = &req.color {
        let color = color.to_ascii_lowercase();
        if color == "bw" || color == "color" {
            filters.push_str(&format!("+filterui:color2-{color}"));
        } else {
            filters.push_str(&format!(
                "+filterui:color2-FGcls_{}",
                color.to_ascii_uppercase()
            ));
        }
    }
    url.push_str(&filters);
    url
}

/// `tn=baiduimage` result page; colors go through the fixed `ic` table.
fn baidu_query_url(req: &SearchRequest) -> Result<String, Error> {
    let mut url = format!(
        "https://image.baidu.com/search/index?tn=baiduimage&word={}",
        encode_keywords(&req.keywords)
    );
    if req.face_only {
        url.push_str("&face=1");
    }
    if let Some(color) = &req.color {
        let color = color.to_ascii_lowercase();
        let code = baidu_color_code(&color).ok_or_else(|| {
            Error::InvalidParameter(format!("unknown baidu color: {color}"))
        })?;
        url.push_str(&format!("&ic={code}"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FetchMode;

    fn request(backend: Backend) -> SearchRequest {
        SearchRequest::new("red car", backend, FetchMode::Render)
    }

    #[test]
    fn test_keywords_are_percent_encoded() {
        assert_eq!(encode_keywords("red car"), "red%20car");
        assert_eq!(encode_keywords("c++ & rust"), "c%2B%2B%20%26%20rust");
        assert_eq!(encode_keywords("猫"), "%E7%8C%AB");
    }

    #[test]
    fn test_google_defaults() {
        let url = Backend::Google.build_query(&request(Backend::Google)).unwrap();
        assert_eq!(
            url,
            "https://www.google.com/search?tbm=isch&hl=en&q=red%20car&safe=off&tbs="
        );
    }

    #[test]
    fn test_google_filters_compose_in_order() {
        let req = SearchRequest {
            safe_search: true,
            color: Some("bw".to_string()),
            image_kind: Some(ImageKind::LineDrawing),
            face_only: true,
            ..request(Backend::Google)
        };
        let url = Backend::Google.build_query(&req).unwrap();
        assert_eq!(
            url,
            "https://www.google.com/search?tbm=isch&hl=en&q=red%20car\
             &safe=on&tbs=ic:gray%2Citp:lineartitp:face"
        );
    }

    #[test]
    fn test_google_specific_color() {
        let req = SearchRequest {
            color: Some("Blue".to_string()),
            ..request(Backend::Google)
        };
        let url = Backend::Google.build_query(&req).unwrap();
        assert!(url.ends_with("&tbs=ic:specific%2Cisc:blue%2C"));
    }

    #[test]
    fn test_bing_filter_grammar() {
        let req = SearchRequest {
            face_only: true,
            image_kind: Some(ImageKind::Animated),
            color: Some("teal".to_string()),
            ..request(Backend::Bing)
        };
        let url = Backend::Bing.build_query(&req).unwrap();
        assert_eq!(
            url,
            "https://www.bing.com/images/search?&q=red%20car&qft=\
             +filterui:face-face+filterui:photo-animated+filterui:color2-FGcls_TEAL"
        );
    }

    #[test]
    fn test_bing_kind_tokens_pass_verbatim() {
        for (kind, token) in [
            (ImageKind::Photo, "photo"),
            (ImageKind::Clipart, "clipart"),
            (ImageKind::LineDrawing, "linedrawing"),
            (ImageKind::Animated, "animated"),
        ] {
            let req = SearchRequest {
                image_kind: Some(kind),
                ..request(Backend::Bing)
            };
            let url = Backend::Bing.build_query(&req).unwrap();
            assert!(
                url.ends_with(&format!("&qft=+filterui:photo-{token}")),
                "{kind:?} emitted {url}"
            );
        }
    }

    #[test]
    fn test_bing_bw_color_stays_lowercase() {
        let req = SearchRequest {
            color: Some("bw".to_string()),
            ..request(Backend::Bing)
        };
        let url = Backend::Bing.build_query(&req).unwrap();
        assert!(url.ends_with("&qft=+filterui:color2-bw"));
    }

    #[test]
    fn test_baidu_face_and_color() {
        let req = SearchRequest {
            face_only: true,
            color: Some("teal".to_string()),
            ..request(Backend::Baidu)
        };
        let url = Backend::Baidu.build_query(&req).unwrap();
        assert_eq!(
            url,
            "https://image.baidu.com/search/index?tn=baiduimage&word=red%20car&face=1&ic=8"
        );
    }

    #[test]
    fn test_baidu_color_table() {
        for (color, code) in [("white", 1024), ("bw", 2048), ("red", 1), ("brown", 128)] {
            let req = SearchRequest {
                color: Some(color.to_string()),
                ..request(Backend::Baidu)
            };
            let url = Backend::Baidu.build_query(&req).unwrap();
            assert!(url.ends_with(&format!("&ic={code}")), "{color} -> {url}");
        }
    }

    #[test]
    fn test_baidu_unknown_color_fails_preflight() {
        let req = SearchRequest {
            color: Some("mauve".to_string()),
            ..request(Backend::Baidu)
        };
        let err = Backend::Baidu.build_query(&req).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("mauve")));
    }

    #[test]
    fn test_builders_are_pure() {
        let req = SearchRequest {
            face_only: true,
            color: Some("green".to_string()),
            ..request(Backend::Baidu)
        };
        let a = Backend::Baidu.build_query(&req).unwrap();
        let b = Backend::Baidu.build_query(&req).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_keywords_still_well_formed() {
        let req = SearchRequest::new("", Backend::Google, FetchMode::Render);
        let url = Backend::Google.build_query(&req).unwrap();
        assert!(url.contains("&q=&safe=off"));
    }
}
