use crate::api::client::ApiClient;
use crate::api::model::CmsItem;
use crate::config::{self, RunConfig};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use std::collections::{HashMap, HashSet};

/// Resolved category substitutions for one run. Built once before any item
/// is touched, immutable afterwards.
#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    /// Lowercase category name -> item id, for every configured name that
    /// was found (sources and target alike).
    pub ids_by_name: HashMap<String, String>,
    /// Id of the category the retiring ones collapse into.
    pub target_id: String,
}

impl SubstitutionTable {
    /// Ids of the retiring categories: every resolved id except the target's.
    pub fn retiring_ids(&self) -> HashSet<&str> {
        self.ids_by_name
            .values()
            .filter(|id| **id != self.target_id)
            .map(String::as_str)
            .collect()
    }
}

/// Fetch the category collection (first page only; deeper pagination is out
/// of scope) and resolve the configured names. A missing target name aborts
/// the whole run; missing source names are simply skipped.
pub async fn resolve(client: &ApiClient, cfg: &RunConfig) -> AppResult<SubstitutionTable> {
    let ctx = format!("Categories [{}]", cfg.categories_collection_id);
    let page = client
        .fetch_items(&cfg.categories_url(), config::CATEGORY_PAGE_LIMIT, 0, &ctx)
        .await?;

    if let Some(total) = page.pagination.as_ref().and_then(|p| p.total) {
        if total > config::CATEGORY_PAGE_LIMIT {
            log(
                LogLevel::Warning,
                &format!(
                    "{} - Collection reports {} categories but only {} were fetched; later entries cannot be matched.",
                    ctx,
                    total,
                    config::CATEGORY_PAGE_LIMIT
                ),
            );
        }
    }

    let table = build_table(&page.items, &cfg.source_names, &cfg.target_name)?;
    log(
        LogLevel::Info,
        &format!(
            "{} - Resolved {} of {} configured names (target '{}' -> {}).",
            ctx,
            table.ids_by_name.len(),
            cfg.source_names.len() + 1,
            cfg.target_name,
            table.target_id
        ),
    );
    Ok(table)
}

/// Pure name matching, split out of the fetch so it can be exercised without
/// a network. Matching is case-insensitive exact compare on `fieldData.name`.
pub fn build_table(
    categories: &[CmsItem],
    source_names: &[String],
    target_name: &str,
) -> AppResult<SubstitutionTable> {
    let wanted: HashSet<String> = source_names.iter().map(|n| n.to_lowercase()).collect();
    let target_lower = target_name.to_lowercase();

    let mut ids_by_name = HashMap::new();
    let mut target_id = None;

    for category in categories {
        let Some(name) = category.field_data.name.as_deref() else {
            continue;
        };
        let name_lower = name.to_lowercase();

        if wanted.contains(&name_lower) {
            ids_by_name.insert(name_lower.clone(), category.id.clone());
        }
        if name_lower == target_lower {
            target_id = Some(category.id.clone());
            ids_by_name.insert(target_lower.clone(), category.id.clone());
        }
    }

    let target_id = target_id.ok_or_else(|| {
        AppError::CategoryLookup(format!(
            "'{}' category not found in categories collection",
            target_name
        ))
    })?;

    Ok(SubstitutionTable {
        ids_by_name,
        target_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::FieldData;

    fn category(id: &str, name: &str) -> CmsItem {
        CmsItem {
            id: id.to_string(),
            field_data: FieldData {
                name: Some(name.to_string()),
                slug: None,
                keywords: None,
            },
        }
    }

    fn sources() -> Vec<String> {
        vec!["anxiety".to_string(), "mental health".to_string()]
    }

    #[test]
    fn resolves_sources_and_target() {
        let categories = vec![
            category("c1", "Anxiety"),
            category("c2", "Mental Health"),
            category("c3", "Mental Wellness"),
        ];

        let table = build_table(&categories, &sources(), "mental wellness").unwrap();

        assert_eq!(table.target_id, "c3");
        assert_eq!(table.ids_by_name["anxiety"], "c1");
        assert_eq!(table.ids_by_name["mental health"], "c2");
        assert_eq!(table.ids_by_name["mental wellness"], "c3");
        assert_eq!(table.retiring_ids(), ["c1", "c2"].into_iter().collect());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let categories = vec![category("c1", "ANXIETY"), category("c3", "MeNtAl WeLlNeSs")];
        let table = build_table(&categories, &sources(), "mental wellness").unwrap();
        assert_eq!(table.target_id, "c3");
        assert_eq!(table.ids_by_name["anxiety"], "c1");
    }

    #[test]
    fn missing_source_names_are_not_errors() {
        let categories = vec![category("c3", "Mental Wellness")];
        let table = build_table(&categories, &sources(), "mental wellness").unwrap();
        assert_eq!(table.target_id, "c3");
        assert!(table.retiring_ids().is_empty());
    }

    #[test]
    fn missing_target_is_fatal() {
        let categories = vec![category("c1", "Anxiety"), category("c2", "Mental Health")];
        let err = build_table(&categories, &sources(), "mental wellness").unwrap_err();
        assert!(matches!(err, AppError::CategoryLookup(_)));
    }

    #[test]
    fn nameless_categories_are_skipped() {
        let mut nameless = category("c0", "x");
        nameless.field_data.name = None;
        let categories = vec![nameless, category("c3", "Mental Wellness")];
        let table = build_table(&categories, &sources(), "mental wellness").unwrap();
        assert_eq!(table.ids_by_name.len(), 1);
    }
}
