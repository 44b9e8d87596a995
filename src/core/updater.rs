use crate::api::client::ApiClient;
use crate::config::{self, RunConfig};
use crate::core::ledger::ProgressLedger;
use crate::core::resolver::SubstitutionTable;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;

/// Transport seam for the update call, so the retry policy can be driven
/// without a live API.
#[async_trait]
pub trait ItemPatcher: Send + Sync {
    async fn patch_keywords(&self, item_id: &str, keywords: &[String]) -> AppResult<()>;
}

/// Real transport: PATCHes through the shared API client.
pub struct CmsPatcher<'a> {
    pub client: &'a ApiClient,
    pub cfg: &'a RunConfig,
}

#[async_trait]
impl ItemPatcher for CmsPatcher<'_> {
    async fn patch_keywords(&self, item_id: &str, keywords: &[String]) -> AppResult<()> {
        let ctx = format!("Update [{}]", item_id);
        self.client
            .patch_keywords(&self.cfg.item_url(item_id), keywords, &ctx)
            .await
    }
}

/// What happened to one item. Failures never escape as errors; they become
/// an outcome the orchestrator counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Keywords rewritten and PATCH succeeded. `ledgered` is false when the
    /// ledger write afterwards failed; the remote item is migrated but a
    /// rerun will re-send it.
    Updated { ledgered: bool },
    /// Already in the ledger from a previous run; nothing done.
    AlreadyDone,
    /// Item has no keyword list; nothing to migrate.
    NoKeywords,
    /// No retiring category id present; no call issued, never ledgered.
    NotAffected,
    /// All update attempts exhausted; stays out of the ledger so a future
    /// run picks it up again.
    Failed,
}

/// Rewrite a keyword list against the substitution table: every retiring id
/// becomes the target id, everything else passes through, duplicates collapse
/// keeping first occurrence. Returns `None` when no retiring id was present,
/// including for items that already carry the target id on their own - those
/// need no call.
pub fn rewrite_keywords(keywords: &[String], table: &SubstitutionTable) -> Option<Vec<String>> {
    let retiring = table.retiring_ids();
    let mut replaced_any = false;
    let mut seen = HashSet::new();
    let mut rewritten = Vec::with_capacity(keywords.len());

    for id in keywords {
        let mapped = if retiring.contains(id.as_str()) {
            replaced_any = true;
            table.target_id.as_str()
        } else {
            id.as_str()
        };
        if seen.insert(mapped) {
            rewritten.push(mapped.to_string());
        }
    }

    replaced_any.then_some(rewritten)
}

/// Decide and, if needed, perform the update for one item. Never returns an
/// error: every failure is logged and folded into the outcome.
pub async fn update_if_needed<P: ItemPatcher>(
    patcher: &P,
    item_id: &str,
    keywords: Option<&[String]>,
    table: &SubstitutionTable,
    ledger: &ProgressLedger,
) -> ItemOutcome {
    if ledger.contains(item_id).await {
        return ItemOutcome::AlreadyDone;
    }

    let Some(keywords) = keywords else {
        return ItemOutcome::NoKeywords;
    };

    let Some(rewritten) = rewrite_keywords(keywords, table) else {
        return ItemOutcome::NotAffected;
    };

    match patch_with_retry(patcher, item_id, &rewritten).await {
        Ok(()) => {
            let ledgered = match ledger.record_and_persist(item_id).await {
                Ok(()) => true,
                Err(e) => {
                    log(
                        LogLevel::Warning,
                        &format!(
                            "Item {} updated but ledger write failed ({}); a rerun will re-send it.",
                            item_id, e
                        ),
                    );
                    false
                }
            };
            ItemOutcome::Updated { ledgered }
        }
        Err(e) => {
            log(
                LogLevel::Error,
                &format!(
                    "Failed to update item {} after {} attempts: {:?}",
                    item_id,
                    config::MAX_UPDATE_ATTEMPTS,
                    e
                ),
            );
            ItemOutcome::Failed
        }
    }
}

// Bounded attempts with no backoff between them; a 429 inside an attempt
// waits out the fixed cooldown and re-sends without consuming the budget.
async fn patch_with_retry<P: ItemPatcher>(
    patcher: &P,
    item_id: &str,
    keywords: &[String],
) -> AppResult<()> {
    let mut last_error = None;

    for attempt in 1..=config::MAX_UPDATE_ATTEMPTS {
        loop {
            match patcher.patch_keywords(item_id, keywords).await {
                Ok(()) => return Ok(()),
                Err(AppError::RateLimited(ctx)) => {
                    log(
                        LogLevel::Warning,
                        &format!(
                            "{} - Rate limited; cooling down {}s before re-sending.",
                            ctx,
                            config::RATE_LIMIT_COOLDOWN_SECS
                        ),
                    );
                    sleep(Duration::from_secs(config::RATE_LIMIT_COOLDOWN_SECS)).await;
                }
                Err(e) => {
                    log(
                        LogLevel::Warning,
                        &format!(
                            "Update [{}] attempt {}/{} failed: {:?}",
                            item_id,
                            attempt,
                            config::MAX_UPDATE_ATTEMPTS,
                            e
                        ),
                    );
                    last_error = Some(e);
                    break;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| AppError::Unexpected(format!("Update [{}] never attempted", item_id))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::build_table;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn table() -> SubstitutionTable {
        let categories = vec![
            category("c1", "Anxiety"),
            category("c2", "Mental Health"),
            category("c3", "Mental Wellness"),
        ];
        let sources = vec!["anxiety".to_string(), "mental health".to_string()];
        build_table(&categories, &sources, "mental wellness").unwrap()
    }

    fn category(id: &str, name: &str) -> crate::api::model::CmsItem {
        crate::api::model::CmsItem {
            id: id.to_string(),
            field_data: crate::api::model::FieldData {
                name: Some(name.to_string()),
                slug: None,
                keywords: None,
            },
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrite_replaces_retiring_ids() {
        let rewritten = rewrite_keywords(&ids(&["c1", "c9"]), &table()).unwrap();
        assert_eq!(rewritten, ids(&["c3", "c9"]));
    }

    #[test]
    fn rewrite_collapses_multiple_retiring_ids_to_one_target() {
        let rewritten = rewrite_keywords(&ids(&["c1", "c2", "c9"]), &table()).unwrap();
        assert_eq!(rewritten.iter().filter(|id| *id == "c3").count(), 1);
        assert!(!rewritten.contains(&"c1".to_string()));
        assert!(!rewritten.contains(&"c2".to_string()));
        assert!(rewritten.contains(&"c9".to_string()));
    }

    #[test]
    fn rewrite_dedupes_against_existing_target() {
        let rewritten = rewrite_keywords(&ids(&["c3", "c1"]), &table()).unwrap();
        assert_eq!(rewritten, ids(&["c3"]));
    }

    #[test]
    fn no_retiring_id_means_no_rewrite() {
        assert!(rewrite_keywords(&ids(&["c9"]), &table()).is_none());
        // Already on the target category with nothing to retire: untouched.
        assert!(rewrite_keywords(&ids(&["c3", "c9"]), &table()).is_none());
        assert!(rewrite_keywords(&[], &table()).is_none());
    }

    /// Scripted transport: pops one canned response per call.
    struct FakePatcher {
        responses: Mutex<Vec<AppResult<()>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakePatcher {
        fn new(mut responses: Vec<AppResult<()>>) -> Self {
            responses.reverse();
            FakePatcher {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_keywords(&self) -> Vec<String> {
            self.calls.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl ItemPatcher for FakePatcher {
        async fn patch_keywords(&self, _item_id: &str, keywords: &[String]) -> AppResult<()> {
            self.calls.lock().unwrap().push(keywords.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(AppError::Unexpected("script exhausted".into())))
        }
    }

    async fn empty_ledger(dir: &tempfile::TempDir) -> ProgressLedger {
        ProgressLedger::load(&dir.path().join("ledger.json"))
            .await
            .unwrap()
    }

    fn api_failure() -> AppError {
        AppError::api_error(500, "boom", "test")
    }

    #[tokio::test]
    async fn updates_and_records_affected_item() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![Ok(())]);

        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c1", "c9"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::Updated { ledgered: true });
        assert_eq!(patcher.call_count(), 1);
        assert_eq!(patcher.last_keywords(), ids(&["c3", "c9"]));
        assert!(ledger.contains("i1").await);
    }

    #[tokio::test]
    async fn ledgered_item_is_skipped_without_a_call() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        ledger.record_and_persist("i1").await.unwrap();
        let patcher = FakePatcher::new(vec![Ok(())]);

        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c1"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::AlreadyDone);
        assert_eq!(patcher.call_count(), 0);
    }

    #[tokio::test]
    async fn item_without_keywords_is_skipped() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![Ok(())]);

        let outcome = update_if_needed(&patcher, "i1", None, &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::NoKeywords);
        assert_eq!(patcher.call_count(), 0);
        assert!(!ledger.contains("i1").await);
    }

    #[tokio::test]
    async fn unaffected_item_issues_no_call_and_stays_unledgered() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![Ok(())]);

        let outcome =
            update_if_needed(&patcher, "i2", Some(&ids(&["c9"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::NotAffected);
        assert_eq!(patcher.call_count(), 0);
        assert!(!ledger.contains("i2").await);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_and_retries_without_consuming_attempts() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![
            Err(AppError::RateLimited("Update [i1]".into())),
            Err(AppError::RateLimited("Update [i1]".into())),
            Ok(()),
        ]);

        let started = tokio::time::Instant::now();
        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c1"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::Updated { ledgered: true });
        assert_eq!(patcher.call_count(), 3);
        // Two cooldowns were waited out before the successful send.
        assert!(started.elapsed() >= Duration::from_secs(2 * config::RATE_LIMIT_COOLDOWN_SECS));
        assert!(ledger.contains("i1").await);
    }

    #[tokio::test]
    async fn bounded_attempts_exhaust_then_item_is_left_for_next_run() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![
            Err(api_failure()),
            Err(api_failure()),
            Err(api_failure()),
            Err(api_failure()),
            Err(api_failure()),
        ]);

        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c1"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::Failed);
        assert_eq!(patcher.call_count(), config::MAX_UPDATE_ATTEMPTS as usize);
        assert!(!ledger.contains("i1").await);
    }

    #[tokio::test]
    async fn ledger_write_failure_still_reports_the_update() {
        let dir = tempdir().unwrap();
        // Ledger in a directory that does not exist: load sees "no file yet"
        // but every persist fails.
        let ledger = ProgressLedger::load(&dir.path().join("missing").join("ledger.json"))
            .await
            .unwrap();
        let patcher = FakePatcher::new(vec![Ok(())]);

        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c1"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::Updated { ledgered: false });
        assert_eq!(patcher.call_count(), 1);
    }

    #[tokio::test]
    async fn attempt_after_failure_can_still_succeed() {
        let dir = tempdir().unwrap();
        let ledger = empty_ledger(&dir).await;
        let patcher = FakePatcher::new(vec![Err(api_failure()), Err(api_failure()), Ok(())]);

        let outcome =
            update_if_needed(&patcher, "i1", Some(&ids(&["c2"])), &table(), &ledger).await;

        assert_eq!(outcome, ItemOutcome::Updated { ledgered: true });
        assert_eq!(patcher.call_count(), 3);
        assert!(ledger.contains("i1").await);
    }
}
