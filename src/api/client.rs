use crate::api::model::{ItemsPage, KeywordsPatch};
use crate::config::{self, RunConfig};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    auth: HeaderValue,
}

impl ApiClient {
    pub fn new(cfg: &RunConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::HTTP_TIMEOUT_SECONDS))
            .connect_timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT))
            .build()
            .map_err(AppError::from)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", cfg.api_token))
            .map_err(|_| AppError::ConfigError("API token is not a valid header value".into()))?;
        auth.set_sensitive(true);

        Ok(ApiClient { client, auth })
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = config::BASE_HEADERS.clone();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }

    /// GET one page of collection items. Transport errors and server errors
    /// are retried with exponential backoff up to the fetch-retry budget.
    pub async fn fetch_items(
        &self,
        url: &str,
        limit: i64,
        offset: i64,
        context: &str,
    ) -> AppResult<ItemsPage> {
        let params = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=config::MAX_FETCH_RETRIES {
            let log_prefix = format!("API Req {} GET (Try {})", context, attempt + 1);

            let request = self
                .client
                .get(url)
                .headers(self.base_headers())
                .query(&params);

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await.map_err(|e| {
                            log(
                                LogLevel::Warning,
                                &format!("{} - Error reading response body: {}", log_prefix, e),
                            );
                            AppError::from(e)
                        })?;
                        return parse_items_page(&bytes, context);
                    }

                    let error = handle_http_error(resp, status, context).await;
                    log(
                        LogLevel::Warning,
                        &format!("{} Failed: {:?}", log_prefix, error),
                    );
                    last_error = Some(error);
                }
                Err(e) => {
                    let app_error = transport_error(&e, &log_prefix);
                    log(
                        LogLevel::Warning,
                        &format!("{} {:?}", log_prefix, app_error),
                    );
                    last_error = Some(app_error);
                }
            }

            if attempt < config::MAX_FETCH_RETRIES {
                let delay_secs = config::RETRY_DELAY_BASE_SECS * (2.0_f32.powi(attempt as i32));
                sleep(Duration::from_secs_f32(delay_secs)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Unexpected(format!(
                "Request failed after {} retries for {}",
                config::MAX_FETCH_RETRIES + 1,
                context
            ))
        }))
    }

    /// PATCH an item's keyword list. Single attempt: HTTP 429 surfaces as
    /// `AppError::RateLimited` so the caller owns the cooldown and retry
    /// policy; any other failure is returned as-is.
    pub async fn patch_keywords(
        &self,
        url: &str,
        keywords: &[String],
        context: &str,
    ) -> AppResult<()> {
        let payload = KeywordsPatch::new(keywords);

        let resp = self
            .client
            .patch(url)
            .headers(self.base_headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(&e, context))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(context.to_string()));
        }

        Err(handle_http_error(resp, status, context).await)
    }
}

fn parse_items_page(bytes: &Bytes, context: &str) -> AppResult<ItemsPage> {
    serde_json::from_slice(bytes).map_err(|e| {
        let snippet_len = bytes.len().min(200);
        let snippet = String::from_utf8_lossy(&bytes[..snippet_len]);
        log(
            LogLevel::Error,
            &format!(
                "Fail parse items page for {}: {}. Snippet: '{}'",
                context, e, snippet
            ),
        );
        AppError::from(e)
    })
}

fn transport_error(e: &reqwest::Error, log_prefix: &str) -> AppError {
    let context_str = if e.is_timeout() {
        "Timeout"
    } else if e.is_connect() {
        "Connection"
    } else {
        "Request"
    };
    if e.is_timeout() {
        AppError::Timeout(format!("{} {} Error: {}", log_prefix, context_str, e))
    } else {
        AppError::Reqwest(format!("{} {} Error: {}", log_prefix, context_str, e))
    }
}

async fn handle_http_error(resp: Response, status: StatusCode, context: &str) -> AppError {
    let resp_text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    let error_message = format!(
        "{} - Body: {}...",
        status.canonical_reason().unwrap_or("Unknown Status"),
        resp_text.chars().take(150).collect::<String>()
    );

    AppError::api_error(status.as_u16(), error_message, context)
}
