//! Catalog store.
//!
//! Keeps the latest catalog per source. Pushes replace whole entries; order
//! is first-push order and survives replacement.

use canvas_bridge_core::{Catalog, ComponentDescriptor, StyleDescriptor};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedCatalogs = Arc<RwLock<CatalogStore>>;

#[derive(Debug, Default)]
pub struct CatalogStore {
    catalogs: Vec<Catalog>,
}

/// An item together with the catalog it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sourced<'a, T> {
    pub source_id: &'a str,
    pub source_name: &'a str,
    #[serde(flatten)]
    pub item: &'a T,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedCatalogs {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Insert or wholly replace the catalog for `catalog.source_id`.
    pub fn put(&mut self, catalog: Catalog) {
        match self
            .catalogs
            .iter_mut()
            .find(|c| c.source_id == catalog.source_id)
        {
            Some(slot) => *slot = catalog,
            None => self.catalogs.push(catalog),
        }
    }

    pub fn get(&self, source_id: &str) -> Option<&Catalog> {
        self.catalogs.iter().find(|c| c.source_id == source_id)
    }

    pub fn list_all(&self) -> &[Catalog] {
        &self.catalogs
    }

    pub fn has_any(&self) -> bool {
        !self.catalogs.is_empty()
    }

    /// Components whose name, description, set or container contains
    /// `query`, ignoring case. No ranking; store order.
    pub fn search(&self, query: &str) -> Vec<Sourced<'_, ComponentDescriptor>> {
        let needle = query.to_lowercase();
        self.all_components()
            .into_iter()
            .filter(|found| {
                found
                    .item
                    .searchable_fields()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn all_components(&self) -> Vec<Sourced<'_, ComponentDescriptor>> {
        self.catalogs
            .iter()
            .flat_map(|c| c.components.iter().map(move |item| sourced(c, item)))
            .collect()
    }

    pub fn all_styles(&self) -> Vec<Sourced<'_, StyleDescriptor>> {
        self.catalogs
            .iter()
            .flat_map(|c| c.styles.iter().map(move |item| sourced(c, item)))
            .collect()
    }
}

fn sourced<'a, T>(catalog: &'a Catalog, item: &'a T) -> Sourced<'a, T> {
    Sourced {
        source_id: &catalog.source_id,
        source_name: &catalog.source_name,
        item,
    }
}
