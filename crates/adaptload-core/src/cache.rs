//! Cache-control policy for served resources.
//!
//! [`assign`] maps a [`ResourceClass`] to its [`CacheStrategy`]; [`classify`]
//! maps a request path to a class. Both are pure and table-driven, so they
//! are safe to run on every response.
//!
//! Classification order:
//!
//! 1. file extension (static assets, fonts, images)
//! 2. path prefix (`/_next/static/`, `/fonts/`, `/images/`, `/api/`)
//! 3. fallback: [`ResourceClass::DynamicPage`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const ONE_MINUTE: u32 = 60;
pub const ONE_HOUR: u32 = 60 * ONE_MINUTE;
pub const ONE_DAY: u32 = 24 * ONE_HOUR;
pub const ONE_YEAR: u32 = 365 * ONE_DAY;

/// Longest max-age ever assigned. Immutable strategies always use it.
pub const MAX_AGE_CEILING: u32 = ONE_YEAR;

pub const CACHE_CONTROL: &str = "Cache-Control";

/// CDN mirror headers emitted when none are configured.
pub const DEFAULT_CDN_HEADERS: [&str; 2] = ["CDN-Cache-Control", "Vercel-CDN-Cache-Control"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    StaticImmutableAsset,
    Image,
    Font,
    DynamicPage,
    ApiResponse,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 5] = [
        ResourceClass::StaticImmutableAsset,
        ResourceClass::Image,
        ResourceClass::Font,
        ResourceClass::DynamicPage,
        ResourceClass::ApiResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::StaticImmutableAsset => "static-immutable-asset",
            ResourceClass::Image => "image",
            ResourceClass::Font => "font",
            ResourceClass::DynamicPage => "dynamic-page",
            ResourceClass::ApiResponse => "api-response",
        }
    }
}

/// HTTP cache-control contract for one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStrategy {
    pub max_age_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate_seconds: Option<u32>,
    pub immutable: bool,
    pub is_public: bool,
}

impl CacheStrategy {
    /// Immutable, public, cached for [`MAX_AGE_CEILING`]. The only way to
    /// build an immutable strategy.
    pub const fn immutable() -> Self {
        Self {
            max_age_seconds: MAX_AGE_CEILING,
            stale_while_revalidate_seconds: None,
            immutable: true,
            is_public: true,
        }
    }

    pub const fn revalidating(max_age_seconds: u32, stale_while_revalidate_seconds: u32) -> Self {
        Self {
            max_age_seconds,
            stale_while_revalidate_seconds: Some(stale_while_revalidate_seconds),
            immutable: false,
            is_public: true,
        }
    }

    /// `Cache-Control` directive string.
    pub fn directive(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        parts.push(if self.is_public { "public".to_string() } else { "private".to_string() });
        parts.push(format!("max-age={}", self.max_age_seconds));
        if let Some(swr) = self.stale_while_revalidate_seconds {
            parts.push(format!("stale-while-revalidate={swr}"));
        }
        if self.immutable {
            parts.push("immutable".to_string());
        }
        parts.join(", ")
    }

    /// `Cache-Control` plus each CDN mirror header carrying the same value.
    pub fn headers<S: AsRef<str>>(&self, cdn_headers: &[S]) -> BTreeMap<String, String> {
        let value = self.directive();
        let mut headers = BTreeMap::new();
        headers.insert(CACHE_CONTROL.to_string(), value.clone());
        for name in cdn_headers {
            headers.insert(name.as_ref().to_string(), value.clone());
        }
        headers
    }
}

const STRATEGY_TABLE: [(ResourceClass, CacheStrategy); 5] = [
    (ResourceClass::StaticImmutableAsset, CacheStrategy::immutable()),
    (
        ResourceClass::Image,
        CacheStrategy::revalidating(ONE_YEAR, ONE_DAY),
    ),
    (ResourceClass::Font, CacheStrategy::immutable()),
    (
        ResourceClass::DynamicPage,
        CacheStrategy::revalidating(ONE_MINUTE, ONE_HOUR),
    ),
    (
        ResourceClass::ApiResponse,
        CacheStrategy::revalidating(5 * ONE_MINUTE, 30 * ONE_MINUTE),
    ),
];

pub fn assign(class: ResourceClass) -> CacheStrategy {
    STRATEGY_TABLE
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, strategy)| *strategy)
        .unwrap_or(STRATEGY_TABLE[3].1)
}

const EXTENSION_RULES: [(&[&str], ResourceClass); 3] = [
    (&["js", "mjs", "css", "map", "wasm"], ResourceClass::StaticImmutableAsset),
    (&["woff", "woff2", "ttf", "otf", "eot"], ResourceClass::Font),
    (
        &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "mp4", "webm"],
        ResourceClass::Image,
    ),
];

const PREFIX_RULES: [(&str, ResourceClass); 4] = [
    ("/_next/static/", ResourceClass::StaticImmutableAsset),
    ("/fonts/", ResourceClass::Font),
    ("/images/", ResourceClass::Image),
    ("/api/", ResourceClass::ApiResponse),
];

/// Classify a request path (or full URL). Never fails; unmatched paths are
/// dynamic pages.
pub fn classify(path: &str) -> ResourceClass {
    let path = request_path(path);

    if let Some(ext) = extension(&path) {
        for (extensions, class) in EXTENSION_RULES {
            if extensions.contains(&ext.as_str()) {
                return class;
            }
        }
    }

    for (prefix, class) in PREFIX_RULES {
        if path.starts_with(prefix) {
            return class;
        }
    }

    ResourceClass::DynamicPage
}

/// Headers for a request path in one call.
pub fn headers_for_path<S: AsRef<str>>(path: &str, cdn_headers: &[S]) -> (ResourceClass, BTreeMap<String, String>) {
    let class = classify(path);
    (class, assign(class).headers(cdn_headers))
}

fn request_path(raw: &str) -> String {
    if let Ok(url) = Url::parse(raw) {
        if url.has_host() {
            return url.path().to_string();
        }
    }
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    raw[..end].to_string()
}

fn extension(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
