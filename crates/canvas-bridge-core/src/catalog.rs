//! Catalog snapshots pushed by peers.
//!
//! A catalog lists the reusable components and styles a peer found in one
//! source (a document or library). Fields the bridge does not interpret are
//! kept in `extra` and passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One source's components and styles, keyed by `source_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub styles: Vec<StyleDescriptor>,
    /// When the peer took the snapshot, in whatever form it reports
    /// (usually epoch milliseconds). Passed through untouched.
    #[serde(default)]
    pub scanned_at: Value,
}

/// A reusable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            set_name: None,
            container_name: None,
            extra: Map::new(),
        }
    }

    /// The text fields searched by name lookups.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.name.as_str()),
            Some(self.description.as_str()),
            self.set_name.as_deref(),
            self.container_name.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// A shared style (color, text, effect, grid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
