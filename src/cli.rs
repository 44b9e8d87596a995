use crate::config::{self, RunConfig};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Merges retiring CMS blog-post categories into one canonical category.",
    long_about = None,
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "COLLECTION_ID",
        help = "Blog-post collection to migrate"
    )]
    items_collection: Option<String>,

    #[arg(
        long,
        value_name = "COLLECTION_ID",
        help = "Collection holding the category records"
    )]
    categories_collection: Option<String>,

    #[arg(
        long,
        value_name = "TOKEN",
        help = "API bearer token (falls back to the CMS_API_TOKEN env var)"
    )]
    token: Option<String>,

    #[arg(
        long,
        default_value = config::DEFAULT_LEDGER_FILE,
        value_name = "FILE_PATH",
        help = "Progress ledger file; reruns skip items recorded here"
    )]
    ledger: String,

    #[arg(
        long,
        default_value_t = config::DEFAULT_PAGE_SIZE,
        value_name = "N",
        help = "Items fetched per page"
    )]
    page_size: i64,

    #[arg(
        long,
        default_value_t = config::DEFAULT_UPDATE_CONCURRENCY,
        value_name = "N",
        help = "Concurrent update calls within a page"
    )]
    concurrency: usize,

    #[arg(
        long = "source",
        value_name = "NAME",
        help = "Retiring category name (repeatable; defaults to the built-in set)"
    )]
    sources: Vec<String>,

    #[arg(
        long,
        default_value = config::DEFAULT_TARGET_NAME,
        value_name = "NAME",
        help = "Category the retiring ones merge into"
    )]
    target: String,

    #[arg(
        long,
        default_value = config::DEFAULT_BASE_URL,
        value_name = "URL",
        help = "API base URL"
    )]
    base_url: String,

    #[arg(
        long,
        value_name = "FILE_PATH",
        help = "Plan offline against a local items JSON file instead of the API",
        conflicts_with_all = ["items_collection", "categories_collection", "token"],
        requires = "plan_categories_file"
    )]
    plan_items_file: Option<String>,

    #[arg(
        long,
        value_name = "FILE_PATH",
        help = "Local categories JSON file for offline planning",
        requires = "plan_items_file"
    )]
    plan_categories_file: Option<String>,
}

impl CliArgs {
    pub fn plan_files(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.plan_items_file, &self.plan_categories_file) {
            (Some(items), Some(categories)) => {
                Some((PathBuf::from(items), PathBuf::from(categories)))
            }
            _ => None,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        if self.sources.is_empty() {
            config::DEFAULT_SOURCE_NAMES.clone()
        } else {
            self.sources
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect()
        }
    }

    pub fn target_name(&self) -> String {
        self.target.trim().to_lowercase()
    }

    pub fn run_config(&self) -> AppResult<RunConfig> {
        let items_collection_id = self
            .items_collection
            .clone()
            .ok_or_else(|| AppError::Argument("--items-collection is required.".into()))?;
        let categories_collection_id = self
            .categories_collection
            .clone()
            .ok_or_else(|| AppError::Argument("--categories-collection is required.".into()))?;

        let api_token = match &self.token {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => std::env::var(config::API_TOKEN_ENV).map_err(|_| {
                AppError::Argument(format!(
                    "No API token. Pass --token or set {}.",
                    config::API_TOKEN_ENV
                ))
            })?,
        };

        if self.page_size < 1 {
            return Err(AppError::Argument("--page-size must be at least 1.".into()));
        }
        if self.concurrency < 1 {
            return Err(AppError::Argument(
                "--concurrency must be at least 1.".into(),
            ));
        }

        let source_names = self.source_names();
        let target_name = self.target_name();
        if target_name.is_empty() {
            return Err(AppError::Argument("--target must not be empty.".into()));
        }
        if source_names.contains(&target_name) {
            log(
                LogLevel::Warning,
                &format!(
                    "Target '{}' is also listed as a source; it resolves to itself and is never retired.",
                    target_name
                ),
            );
        }

        Ok(RunConfig {
            api_token,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            items_collection_id,
            categories_collection_id,
            ledger_path: PathBuf::from(&self.ledger),
            page_size: self.page_size,
            update_concurrency: self.concurrency,
            source_names,
            target_name,
        })
    }
}
