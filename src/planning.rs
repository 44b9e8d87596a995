use crate::api::model::ItemsPage;
use crate::core::resolver;
use crate::core::updater;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use std::path::Path;
use tokio::fs;

/// Offline rehearsal: apply the substitution rule to local JSON fixtures
/// (collection-items page format) and print what a live run would do. No
/// network and no ledger writes.
pub async fn plan(
    items_path: &Path,
    categories_path: &Path,
    source_names: &[String],
    target_name: &str,
) -> AppResult<()> {
    log(LogLevel::Step, "--- Offline Plan Mode ---");
    log(
        LogLevel::Info,
        &format!(
            "Items: {}, categories: {}",
            items_path.display(),
            categories_path.display()
        ),
    );

    let categories = read_page(categories_path).await?;
    let table = resolver::build_table(&categories.items, source_names, target_name)?;
    log(
        LogLevel::Info,
        &format!(
            "Resolved {} name(s); target '{}' -> {}.",
            table.ids_by_name.len(),
            target_name,
            table.target_id
        ),
    );

    let items = read_page(items_path).await?;
    let mut would_update = 0usize;
    let mut untouched = 0usize;

    for item in &items.items {
        match item.field_data.keywords.as_deref() {
            None => {
                untouched += 1;
                log(
                    LogLevel::Info,
                    &format!("{}: no keyword list, nothing to migrate.", item.id),
                );
            }
            Some(keywords) => match updater::rewrite_keywords(keywords, &table) {
                Some(rewritten) => {
                    would_update += 1;
                    log(
                        LogLevel::Info,
                        &format!(
                            "{}: would rewrite {:?} -> {:?}",
                            item.id, keywords, rewritten
                        ),
                    );
                }
                None => {
                    untouched += 1;
                    log(
                        LogLevel::Info,
                        &format!("{}: no retiring category referenced, untouched.", item.id),
                    );
                }
            },
        }
    }

    log(
        LogLevel::Success,
        &format!(
            "Plan complete: {} of {} item(s) would be updated, {} untouched.",
            would_update,
            items.items.len(),
            untouched
        ),
    );
    Ok(())
}

async fn read_page(path: &Path) -> AppResult<ItemsPage> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Io(format!("I/O error at path '{}': {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::SerdeParse(format!(
            "'{}' is not a collection-items page: {}",
            path.display(),
            e
        ))
    })
}
