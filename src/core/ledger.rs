use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Persisted set of item ids whose update already succeeded. The file is a
/// flat JSON array of id strings, rewritten in full after every successful
/// update so a crash loses at most the in-flight item. State and rewrite are
/// guarded by one mutex so concurrent completions within a page serialize
/// instead of racing on the file. Single process only.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

#[derive(Debug)]
struct LedgerState {
    // Insertion order is kept for the file; the set backs contains().
    ordered: Vec<String>,
    known: HashSet<String>,
}

impl ProgressLedger {
    /// Load persisted state; a missing file is an empty ledger.
    pub async fn load(path: &Path) -> AppResult<Self> {
        let ordered: Vec<String> = match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::SerdeParse(format!(
                    "Ledger file '{}' is not a JSON array of strings: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(map_io_error(e, path)),
        };

        if !ordered.is_empty() {
            log(
                LogLevel::Info,
                &format!(
                    "Loaded ledger '{}' with {} completed item(s).",
                    path.display(),
                    ordered.len()
                ),
            );
        }

        let known = ordered.iter().cloned().collect();
        Ok(ProgressLedger {
            path: path.to_path_buf(),
            state: Mutex::new(LedgerState { ordered, known }),
        })
    }

    pub async fn contains(&self, item_id: &str) -> bool {
        self.state.lock().await.known.contains(item_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Record a completed item and rewrite the whole file before returning.
    /// Recording an already-known id is a no-op.
    pub async fn record_and_persist(&self, item_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.known.insert(item_id.to_string()) {
            return Ok(());
        }
        state.ordered.push(item_id.to_string());

        let json = serde_json::to_vec_pretty(&state.ordered).map_err(AppError::from)?;
        write_atomic(&self.path, &json).await
    }
}

fn map_io_error(error: std::io::Error, path: &Path) -> AppError {
    AppError::Io(format!("I/O error at path '{}': {}", path.display(), error))
}

// Write to a sibling temp file then rename, so an interrupted write can
// never truncate the ledger.
async fn write_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    let tmp_path = path.with_extension("json.tmp");

    let mut file = File::create(&tmp_path)
        .await
        .map_err(|e| map_io_error(e, &tmp_path))?;
    file.write_all(data)
        .await
        .map_err(|e| map_io_error(e, &tmp_path))?;
    file.flush().await.map_err(|e| map_io_error(e, &tmp_path))?;
    drop(file);

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| map_io_error(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("updated_items.json");
        let ledger = ProgressLedger::load(&path).await.unwrap();
        assert!(ledger.is_empty().await);
        assert!(!ledger.contains("i1").await);
    }

    #[tokio::test]
    async fn record_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("updated_items.json");

        let ledger = ProgressLedger::load(&path).await.unwrap();
        ledger.record_and_persist("i1").await.unwrap();
        ledger.record_and_persist("i2").await.unwrap();
        assert!(ledger.contains("i1").await);

        let reloaded = ProgressLedger::load(&path).await.unwrap();
        assert_eq!(reloaded.len().await, 2);
        assert!(reloaded.contains("i1").await);
        assert!(reloaded.contains("i2").await);

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec!["i1".to_string(), "i2".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_record_is_a_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("updated_items.json");

        let ledger = ProgressLedger::load(&path).await.unwrap();
        ledger.record_and_persist("i1").await.unwrap();
        ledger.record_and_persist("i1").await.unwrap();
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("updated_items.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ProgressLedger::load(&path).await.unwrap_err();
        assert!(matches!(err, AppError::SerdeParse(_)));
    }

    #[tokio::test]
    async fn concurrent_records_all_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("updated_items.json");
        let ledger = std::sync::Arc::new(ProgressLedger::load(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_and_persist(&format!("i{}", i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reloaded = ProgressLedger::load(&path).await.unwrap();
        assert_eq!(reloaded.len().await, 20);
    }
}
