use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use statline_core::config::LoadOptions;
use statline_core::{DiscoveryService, EndpointSummary};

use crate::commands::{load_catalog, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct EndpointsReport<'a> {
    command: &'static str,
    status: &'static str,
    category: Option<&'a str>,
    categories: BTreeMap<String, usize>,
    endpoints: Vec<EndpointSummary>,
}

pub fn run(options: LoadOptions, category: Option<&str>) -> CommandResult {
    let config = match load_config("endpoints", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let catalog = match load_catalog("endpoints", &config) {
        Ok(catalog) => catalog,
        Err(result) => return result,
    };

    let discovery = DiscoveryService::new(Arc::new(catalog));
    CommandResult::report(
        "endpoints",
        &EndpointsReport {
            command: "endpoints",
            status: "ok",
            category,
            categories: discovery.categories(),
            endpoints: discovery.list(category),
        },
    )
}
