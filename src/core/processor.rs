use crate::api::client::ApiClient;
use crate::config::RunConfig;
use crate::core::fetcher::{CmsFetcher, PageFetcher};
use crate::core::ledger::ProgressLedger;
use crate::core::resolver::{self, SubstitutionTable};
use crate::core::stats::{self, PhaseStats, RunStats};
use crate::core::updater::{self, CmsPatcher, ItemOutcome, ItemPatcher};
use crate::error::AppResult;
use crate::logging::{log, LogLevel};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};

pub async fn run(cfg: RunConfig) -> AppResult<i32> {
    let overall_start_time = Instant::now();
    let start_ts_str = Utc::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();

    log(
        LogLevel::Step,
        &format!("Starting CMS keyword migration at {}", start_ts_str),
    );
    log(
        LogLevel::Info,
        &format!(
            "Items collection: {}, categories collection: {}, ledger: {}",
            cfg.items_collection_id,
            cfg.categories_collection_id,
            cfg.ledger_path.display()
        ),
    );

    let client = ApiClient::new(&cfg)?;
    let mut run_stats = stats::initialize_stats();

    let resolve_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 1: Category Resolve ---");
    let stats_resolve = run_stats.get_mut(stats::PHASE_RESOLVE).unwrap();
    stats_resolve.add_total(1);

    // The only run-aborting failure: no target category means no item may
    // be touched.
    let table = match resolver::resolve(&client, &cfg).await {
        Ok(table) => {
            stats_resolve.add_ok();
            table
        }
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("Category resolution failed, aborting run: {:?}", e),
            );
            return Err(e);
        }
    };
    log_phase_completion(
        "Category Resolve",
        &run_stats[stats::PHASE_RESOLVE],
        resolve_start_time.elapsed(),
    );

    let ledger = ProgressLedger::load(&cfg.ledger_path).await?;
    let fetcher = CmsFetcher {
        client: &client,
        cfg: &cfg,
    };
    let patcher = CmsPatcher {
        client: &client,
        cfg: &cfg,
    };

    let update_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 2: Paged Item Update ---");
    process_pages(
        &fetcher,
        &patcher,
        &table,
        &ledger,
        cfg.page_size,
        cfg.update_concurrency,
        &mut run_stats,
    )
    .await;
    log_phase_completion(
        "Paged Item Update",
        &run_stats[stats::PHASE_UPDATE],
        update_start_time.elapsed(),
    );

    stats::print_summary(&run_stats, ledger.len().await, overall_start_time.elapsed());

    // Per-item failures are resumable and never make the exit non-zero;
    // only category resolution aborts abnormally.
    Ok(0)
}

/// Page loop: fetch, fan out updates bounded by `concurrency`, settle every
/// outcome into stats, advance the offset. Ends on an empty page (exhausted)
/// or a failed fetch (counted, logged, never an error to the caller).
pub async fn process_pages<F: PageFetcher, P: ItemPatcher>(
    fetcher: &F,
    patcher: &P,
    table: &SubstitutionTable,
    ledger: &ProgressLedger,
    page_size: i64,
    concurrency: usize,
    run_stats: &mut RunStats,
) {
    let mut offset: i64 = 0;
    let mut page_num: usize = 1;

    loop {
        let stats_fetch = run_stats.get_mut(stats::PHASE_FETCH).unwrap();
        stats_fetch.add_total(1);

        let items = match fetcher.fetch_page(offset).await {
            Ok(items) => items,
            Err(e) => {
                // Distinct from exhaustion: the fetch itself failed. Stop
                // paging here; everything already ledgered stays done and a
                // re-run resumes from scratch offsets.
                log(
                    LogLevel::Warning,
                    &format!(
                        "Page fetch failed at offset {} ({:?}); ending pagination early.",
                        offset, e
                    ),
                );
                stats_fetch.add_fail();
                break;
            }
        };

        if items.is_empty() {
            stats_fetch.add_skip();
            log(
                LogLevel::Info,
                &format!("Empty page at offset {}; collection exhausted.", offset),
            );
            break;
        }
        stats_fetch.add_ok();

        let page_len = items.len();
        run_stats
            .get_mut(stats::PHASE_UPDATE)
            .unwrap()
            .add_total(page_len);

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| async move {
                updater::update_if_needed(
                    patcher,
                    &item.id,
                    item.field_data.keywords.as_deref(),
                    table,
                    ledger,
                )
                .await
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut page_updated = 0usize;
        let mut page_ledger_fails = 0usize;
        for outcome in &outcomes {
            match outcome {
                ItemOutcome::Updated { ledgered } => {
                    page_updated += 1;
                    if !ledgered {
                        page_ledger_fails += 1;
                    }
                }
                _ => {}
            }
        }

        let stats_update = run_stats.get_mut(stats::PHASE_UPDATE).unwrap();
        for outcome in &outcomes {
            match outcome {
                ItemOutcome::Updated { .. } => stats_update.add_ok(),
                ItemOutcome::Failed => stats_update.add_fail(),
                ItemOutcome::AlreadyDone | ItemOutcome::NoKeywords | ItemOutcome::NotAffected => {
                    stats_update.add_skip()
                }
            }
        }
        let processed_so_far = stats_update.get_processed();

        // Every successful update attempts one ledger write.
        let stats_ledger = run_stats.get_mut(stats::PHASE_LEDGER).unwrap();
        stats_ledger.add_total(page_updated);
        for _ in 0..(page_updated - page_ledger_fails) {
            stats_ledger.add_ok();
        }
        for _ in 0..page_ledger_fails {
            stats_ledger.add_fail();
        }

        log(
            LogLevel::Info,
            &format!(
                "Page {} (offset {}): {} item(s), {} updated, {} processed so far.",
                page_num, offset, page_len, page_updated, processed_so_far
            ),
        );

        offset += page_size;
        page_num += 1;
    }
}

fn log_phase_completion(phase_name: &str, stats: &PhaseStats, duration: Duration) {
    log(
        LogLevel::Step,
        &format!(
            "--- {} complete ({} OK, {} Skip/Empty, {} Fail) in {:.2?} ---",
            phase_name, stats.ok, stats.skip_or_empty, stats.fail, duration
        ),
    );
}
