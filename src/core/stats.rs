use crate::logging::{log, LogLevel};
use std::collections::BTreeMap;
use std::time::Duration;

pub const PHASE_RESOLVE: &str = "Category Resolve";
pub const PHASE_FETCH: &str = "Page Fetch";
pub const PHASE_UPDATE: &str = "Item Update";
pub const PHASE_LEDGER: &str = "Ledger Write";

#[derive(Debug, Clone, Default)]
pub struct PhaseStats {
    pub ok: usize,
    pub fail: usize,
    pub skip_or_empty: usize,
    pub total_tasks: usize,
}

impl PhaseStats {
    pub fn add_ok(&mut self) {
        self.ok += 1;
    }
    pub fn add_fail(&mut self) {
        self.fail += 1;
    }
    pub fn add_skip(&mut self) {
        self.skip_or_empty += 1;
    }
    pub fn add_total(&mut self, n: usize) {
        self.total_tasks += n;
    }
    pub fn get_processed(&self) -> usize {
        self.ok + self.fail + self.skip_or_empty
    }
}

pub type RunStats = BTreeMap<String, PhaseStats>;

pub fn initialize_stats() -> RunStats {
    let mut stats = BTreeMap::new();
    stats.insert(PHASE_RESOLVE.to_string(), PhaseStats::default());
    stats.insert(PHASE_FETCH.to_string(), PhaseStats::default());
    stats.insert(PHASE_UPDATE.to_string(), PhaseStats::default());
    stats.insert(PHASE_LEDGER.to_string(), PhaseStats::default());
    stats
}

pub fn print_summary(stats: &RunStats, ledger_len: usize, duration: Duration) {
    let sep = "=".repeat(60);
    println!("\n{}\n{:^60}\n{}", sep, "Run Summary", sep);
    println!("Total Run Time:    {:.3?}", duration);
    println!("Ledger Entries:    {}", ledger_len);
    println!("{}", "-".repeat(60));

    println!(
        "{:<17} {:<8} {:<12} {:<8} {:<8}",
        "Phase", "OK", "Skip/Empty", "Fail", "Total"
    );
    println!("{}", "-".repeat(60));

    let phases_order = [PHASE_RESOLVE, PHASE_FETCH, PHASE_UPDATE, PHASE_LEDGER];
    for &phase in &phases_order {
        if let Some(s) = stats.get(phase) {
            println!(
                "{:<17} {:<8} {:<12} {:<8} {:<8}",
                phase, s.ok, s.skip_or_empty, s.fail, s.total_tasks
            );
        }
    }
    println!("{}", sep);

    log_overall_status(stats);

    let end_ts_str = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    log(
        LogLevel::Step,
        &format!("--- Run Finished at {} ---", end_ts_str),
    );
}

fn log_overall_status(stats: &RunStats) {
    let fetch_failures = stats.get(PHASE_FETCH).map_or(0, |s| s.fail);
    let update_failures = stats.get(PHASE_UPDATE).map_or(0, |s| s.fail);
    let ledger_failures = stats.get(PHASE_LEDGER).map_or(0, |s| s.fail);

    if fetch_failures > 0 || update_failures > 0 || ledger_failures > 0 {
        log(
            LogLevel::Warning,
            &format!(
                "Run completed with {} fetch failure(s), {} item failure(s) and {} ledger write failure(s); re-run to retry the remainder.",
                fetch_failures, update_failures, ledger_failures
            ),
        );
    } else {
        log(LogLevel::Success, "Run completed successfully.");
    }
}
