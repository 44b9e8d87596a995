use crate::api::client::ApiClient;
use crate::api::model::CmsItem;
use crate::config::RunConfig;
use crate::error::AppResult;
use crate::logging::{log, LogLevel};
use async_trait::async_trait;

/// Transport seam for the paged item fetch, mirroring `ItemPatcher` so the
/// orchestrator's pagination handling can be driven without a live API.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page of blog-post items at the given offset. An `Err` means
    /// the fetch itself failed (after the client's bounded retries); `Ok`
    /// with an empty vector means the collection is exhausted. The two are
    /// deliberately distinct so the caller never mistakes a broken fetch for
    /// end-of-data.
    async fn fetch_page(&self, offset: i64) -> AppResult<Vec<CmsItem>>;
}

/// Real transport: GETs through the shared API client.
pub struct CmsFetcher<'a> {
    pub client: &'a ApiClient,
    pub cfg: &'a RunConfig,
}

#[async_trait]
impl PageFetcher for CmsFetcher<'_> {
    async fn fetch_page(&self, offset: i64) -> AppResult<Vec<CmsItem>> {
        let ctx = format!("Items [offset {}]", offset);
        let page = self
            .client
            .fetch_items(&self.cfg.items_url(), self.cfg.page_size, offset, &ctx)
            .await?;

        match page.pagination.as_ref().and_then(|p| p.total) {
            Some(total) => log(
                LogLevel::Info,
                &format!("{} - Got {} item(s) of {} total.", ctx, page.items.len(), total),
            ),
            None => log(
                LogLevel::Info,
                &format!("{} - Got {} item(s).", ctx, page.items.len()),
            ),
        }

        Ok(page.items)
    }
}
