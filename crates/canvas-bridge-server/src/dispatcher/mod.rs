//! Tool-call boundary.
//!
//! Validates a caller's tool call, routes it to the bridge or the catalog
//! store, and always answers with a well-formed [`ToolResult`].

pub mod schema;
pub mod tools;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use self::tools::{Route, Tool};

/// A tool as advertised to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Caller-visible envelope for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    /// Concatenated text content.
    pub fn message(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

pub struct Dispatcher {
    bridge: Bridge,
}

impl Dispatcher {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tools::TOOLS
            .iter()
            .map(|t| ToolDefinition {
                name: t.name,
                description: t.description,
                input_schema: schema::input_schema(t.params),
            })
            .collect()
    }

    pub async fn call(&self, name: &str, arguments: &Value) -> ToolResult {
        match self.try_call(name, arguments).await {
            Ok(value) => {
                info!(tool = %name, "Tool call succeeded");
                match serde_json::to_string_pretty(&value) {
                    Ok(text) => ToolResult::text(text),
                    Err(e) => ToolResult::error(format!("internal error: {e}")),
                }
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn try_call(&self, name: &str, arguments: &Value) -> Result<Value, DispatchError> {
        let tool = tools::find(name).ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;
        let params =
            schema::normalize(tool.params, arguments).map_err(DispatchError::InvalidParams)?;
        debug!(tool = %name, params = %params, "Dispatching");
        self.route(tool, params).await
    }

    async fn route(&self, tool: &Tool, params: Value) -> Result<Value, DispatchError> {
        match tool.route {
            Route::Peer => Ok(self.bridge.send_command(tool.name, params).await?),
            Route::ConnectionStatus => Ok(json!({
                "connected": self.bridge.is_connected().await,
                "pendingCommands": self.bridge.pending_count().await,
            })),
            Route::ListCatalogs => {
                let store = self.bridge.catalogs().read().await;
                let catalogs: Vec<Value> = store
                    .list_all()
                    .iter()
                    .map(|c| {
                        json!({
                            "sourceId": c.source_id,
                            "sourceName": c.source_name,
                            "components": c.components.len(),
                            "styles": c.styles.len(),
                            "scannedAt": c.scanned_at,
                        })
                    })
                    .collect();
                Ok(json!({ "catalogs": catalogs }))
            }
            Route::SearchComponents => {
                let query = params["query"].as_str().unwrap_or_default();
                let store = self.bridge.catalogs().read().await;
                if !store.has_any() {
                    return Ok(json!({
                        "matches": [],
                        "note": "no catalogs received from the peer yet",
                    }));
                }
                let matches = store.search(query);
                Ok(json!({ "count": matches.len(), "matches": serde_json::to_value(&matches)? }))
            }
            Route::ListStyles => {
                let store = self.bridge.catalogs().read().await;
                Ok(json!({ "styles": serde_json::to_value(store.all_styles())? }))
            }
        }
    }
}
