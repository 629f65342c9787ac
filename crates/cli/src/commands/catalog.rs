use std::collections::BTreeMap;

use serde::Serialize;
use statline_core::config::LoadOptions;

use crate::commands::{load_catalog, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct CatalogReport {
    command: &'static str,
    status: &'static str,
    generated_path: String,
    overrides_path: String,
    entries: usize,
    categories: BTreeMap<String, usize>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("catalog", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let catalog = match load_catalog("catalog", &config) {
        Ok(catalog) => catalog,
        Err(result) => return result,
    };

    CommandResult::report(
        "catalog",
        &CatalogReport {
            command: "catalog",
            status: "ok",
            generated_path: config.catalog.generated_path.display().to_string(),
            overrides_path: config.catalog.overrides_path.display().to_string(),
            entries: catalog.len(),
            categories: catalog.categories(),
        },
    )
}
