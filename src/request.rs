//! Request types shared by every harvest entry point.
//!
//! A [`SearchRequest`] is immutable for the lifetime of one harvest call:
//! the orchestrator reads it, never writes it, and no global state exists
//! beside it.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Backend ──────────────────────────────────────────────────────────────────

/// The closed set of supported image-search engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Google,
    Bing,
    Baidu,
}

impl Backend {
    /// All supported backends, in CLI help order.
    pub const ALL: [Backend; 3] = [Backend::Google, Backend::Bing, Backend::Baidu];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Google => "google",
            Self::Bing => "bing",
            Self::Baidu => "baidu",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "bing" => Ok(Self::Bing),
            "baidu" => Ok(Self::Baidu),
            _ => Err(Error::UnsupportedBackend(s.to_string())),
        }
    }
}

// ─── FetchMode ────────────────────────────────────────────────────────────────

/// How URLs are extracted from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Drive a live browser session through the result page.
    Render,
    /// Fetch the backend's paginated endpoints over plain HTTP.
    Api,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Render => "render",
            Self::Api => "api",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "render" => Ok(Self::Render),
            "api" => Ok(Self::Api),
            _ => Err(Error::InvalidParameter(format!(
                "unknown mode: {s} (expected render or api)"
            ))),
        }
    }
}

// ─── ImageKind ────────────────────────────────────────────────────────────────

/// Image-type filter. Each backend maps this to its own fragment grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Photo,
    Clipart,
    LineDrawing,
    Animated,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Photo => "photo",
            Self::Clipart => "clipart",
            Self::LineDrawing => "linedrawing",
            Self::Animated => "animated",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ImageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(Self::Photo),
            "clipart" => Ok(Self::Clipart),
            "linedrawing" | "lineart" => Ok(Self::LineDrawing),
            "animated" | "gif" => Ok(Self::Animated),
            _ => Err(Error::InvalidParameter(format!("unknown image type: {s}"))),
        }
    }
}

// ─── Proxy ────────────────────────────────────────────────────────────────────

/// Proxy scheme for both the browser argument and the HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Socks5,
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Http => "http",
            Self::Socks5 => "socks5",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ProxyScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "socks5" => Ok(Self::Socks5),
            _ => Err(Error::InvalidParameter(format!(
                "unknown proxy scheme: {s} (expected http or socks5)"
            ))),
        }
    }
}

/// An outbound proxy, fixed for the lifetime of one harvest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySpec {
    pub scheme: ProxyScheme,
    /// `host:port`, no scheme prefix.
    pub host: String,
}

impl ProxySpec {
    pub fn new(scheme: ProxyScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
        }
    }

    /// Full proxy URL, e.g. `socks5://127.0.0.1:1080`.
    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

// ─── SearchRequest ────────────────────────────────────────────────────────────

/// One harvest call's complete input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Keyword phrase, raw (encoding happens in the query builders).
    pub keywords: String,
    pub backend: Backend,
    pub mode: FetchMode,
    /// Requested maximum number of URLs. `0` means no explicit limit and
    /// is normalized to 10 000 by the orchestrator.
    pub max_urls: usize,
    /// Restrict results to faces.
    pub face_only: bool,
    /// Backend-side safe-search filter (Google only honors this).
    pub safe_search: bool,
    /// Optional image-type filter.
    pub image_kind: Option<ImageKind>,
    /// Optional color filter; grammar is backend-specific and Baidu
    /// validates it against a fixed table.
    pub color: Option<String>,
    pub proxy: Option<ProxySpec>,
}

impl SearchRequest {
    pub fn new(keywords: impl Into<String>, backend: Backend, mode: FetchMode) -> Self {
        Self {
            keywords: keywords.into(),
            backend,
            mode,
            ..Self::default()
        }
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            backend: Backend::Google,
            mode: FetchMode::Render,
            max_urls: 100,
            face_only: false,
            safe_search: false,
            image_kind: None,
            color: None,
            proxy: None,
        }
    }
}
