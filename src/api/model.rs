use serde::{Deserialize, Serialize};

/// One page of a collection-items listing. The API wraps items in an object
/// alongside optional pagination metadata.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemsPage {
    #[serde(default)]
    pub items: Vec<CmsItem>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

/// A collection item. Categories carry `name`; blog posts carry `keywords`
/// (category-reference ids). Both come through the same wire shape.
#[derive(Deserialize, Debug, Clone)]
pub struct CmsItem {
    pub id: String,
    #[serde(rename = "fieldData", default)]
    pub field_data: FieldData,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FieldData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

/// PATCH body for rewriting an item's keyword list. Always a full overwrite
/// of the keywords field, never a partial edit.
#[derive(Serialize, Debug, Clone)]
pub struct KeywordsPatch<'a> {
    #[serde(rename = "fieldData")]
    pub field_data: KeywordsField<'a>,
}

#[derive(Serialize, Debug, Clone)]
pub struct KeywordsField<'a> {
    pub keywords: &'a [String],
}

impl<'a> KeywordsPatch<'a> {
    pub fn new(keywords: &'a [String]) -> Self {
        KeywordsPatch {
            field_data: KeywordsField { keywords },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_page_parses_category_listing() {
        let raw = r#"{
            "items": [
                {"id": "c1", "fieldData": {"name": "Anxiety", "slug": "anxiety"}},
                {"id": "c2", "fieldData": {"name": "Mental Health"}}
            ],
            "pagination": {"limit": 100, "offset": 0, "total": 2}
        }"#;
        let page: ItemsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "c1");
        assert_eq!(page.items[0].field_data.name.as_deref(), Some("Anxiety"));
        assert!(page.items[0].field_data.keywords.is_none());
        assert_eq!(page.pagination.unwrap().total, Some(2));
    }

    #[test]
    fn items_page_tolerates_missing_fields() {
        let raw = r#"{"items": [{"id": "i1"}]}"#;
        let page: ItemsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items[0].id, "i1");
        assert!(page.items[0].field_data.keywords.is_none());
        assert!(page.pagination.is_none());

        let empty: ItemsPage = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }

    #[test]
    fn keywords_patch_serializes_full_overwrite() {
        let keywords = vec!["c3".to_string(), "c9".to_string()];
        let patch = KeywordsPatch::new(&keywords);
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"fieldData": {"keywords": ["c3", "c9"]}})
        );
    }
}
