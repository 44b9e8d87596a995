use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.webflow.com/v2";
pub const API_ACCEPT_VERSION: &str = "2.0.0";
pub const API_TOKEN_ENV: &str = "CMS_API_TOKEN";

pub const DEFAULT_LEDGER_FILE: &str = "updated_items.json";
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const DEFAULT_UPDATE_CONCURRENCY: usize = 10;

// Category lookup reads a single page; collections with more than this many
// categories will miss entries.
pub const CATEGORY_PAGE_LIMIT: i64 = 100;

pub const HTTP_TIMEOUT_SECONDS: u64 = 35;
pub const HTTP_CONNECT_TIMEOUT: u64 = 20;

// Transient-failure retries for GETs.
pub const MAX_FETCH_RETRIES: u32 = 3;
pub const RETRY_DELAY_BASE_SECS: f32 = 1.5;

// Update calls: 5 attempts total, no backoff between them. HTTP 429 is
// handled separately with an uncapped fixed cooldown.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 30;

pub static DEFAULT_SOURCE_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    vec!["anxiety".to_string(), "mental health".to_string()]
});
pub const DEFAULT_TARGET_NAME: &str = "mental wellness";

pub static BASE_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut h = HeaderMap::new();
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    h.insert(ACCEPT, HeaderValue::from_static("application/json"));
    h.insert(
        HeaderName::from_static("accept-version"),
        HeaderValue::from_static(API_ACCEPT_VERSION),
    );
    h
});

/// Everything the pipeline needs for one run, resolved from CLI/env up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_token: String,
    pub base_url: String,
    pub items_collection_id: String,
    pub categories_collection_id: String,
    pub ledger_path: PathBuf,
    pub page_size: i64,
    pub update_concurrency: usize,
    pub source_names: Vec<String>,
    pub target_name: String,
}

impl RunConfig {
    pub fn items_url(&self) -> String {
        format!(
            "{}/collections/{}/items",
            self.base_url, self.items_collection_id
        )
    }

    pub fn categories_url(&self) -> String {
        format!(
            "{}/collections/{}/items",
            self.base_url, self.categories_collection_id
        )
    }

    pub fn item_url(&self, item_id: &str) -> String {
        format!("{}/{}", self.items_url(), item_id)
    }
}
