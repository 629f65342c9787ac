use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Base, Catalog, CatalogEntry, ParamsSchema};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub name: String,
    pub base: Base,
    pub path_template: String,
    pub category: String,
    pub cost: u64,
    pub description: String,
    pub params_schema: ParamsSchema,
}

impl From<&CatalogEntry> for EndpointSummary {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            base: entry.base,
            path_template: entry.path_template.clone(),
            category: entry.category.clone(),
            cost: entry.cost,
            description: entry.description.clone(),
            params_schema: entry.params_schema.clone(),
        }
    }
}

/// Read-only catalog browsing for the agent. Never touches the network and never costs budget.
#[derive(Clone, Debug)]
pub struct DiscoveryService {
    catalog: Arc<Catalog>,
}

impl DiscoveryService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn list(&self, category: Option<&str>) -> Vec<EndpointSummary> {
        self.catalog.list_by_category(category).into_iter().map(EndpointSummary::from).collect()
    }

    pub fn categories(&self) -> BTreeMap<String, usize> {
        self.catalog.categories()
    }
}
