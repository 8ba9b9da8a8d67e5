//! MCP front end.
//!
//! Reads newline-delimited JSON-RPC requests (stdin in production) and
//! writes one response line per request. Notifications get no response.

pub mod protocol;

use crate::dispatcher::Dispatcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use self::protocol::{initialize_result, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpError};

pub struct McpServer {
    dispatcher: Dispatcher,
    /// Log correlation only; unrelated to JSON-RPC or bridge ids.
    request_counter: AtomicU64,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            request_counter: AtomicU64::new(1),
        }
    }

    /// Serve until `reader` reaches end of input and every request read
    /// so far has been answered.
    ///
    /// Each request runs on its own task, so a slow `tools/call` never holds
    /// up later requests. Responses are written by this task alone, one line
    /// each, in completion order.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut in_flight = JoinSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        // Dropped at end of input so `rx` closes once the last request answers.
        let mut tx = Some(tx);
        info!("MCP front end starting");

        loop {
            tokio::select! {
                line = lines.next_line(), if tx.is_some() => match line? {
                    Some(line) => {
                        let line = line.trim().to_string();
                        if !line.is_empty()
                            && let Some(tx) = &tx
                        {
                            let server = self.clone();
                            let tx = tx.clone();
                            in_flight.spawn(async move {
                                if let Some(response) = server.handle_line(&line).await {
                                    let _ = tx.send(response);
                                }
                            });
                        }
                    }
                    None => {
                        info!(in_flight = in_flight.len(), "MCP input closed");
                        tx = None;
                    }
                },
                Some(response) = rx.recv() => {
                    let mut json = serde_json::to_string(&response)?;
                    json.push('\n');
                    writer.write_all(json.as_bytes()).await?;
                    writer.flush().await?;
                }
                Some(joined) = in_flight.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "JSON-RPC request task failed");
                    }
                }
                else => break,
            }
        }

        info!("MCP front end shutting down");
        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let req_id = self.request_counter.fetch_add(1, Ordering::Relaxed);
        debug!(req_id, raw = %line, "Received JSON-RPC request");

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                error!(req_id, error = %e, "Failed to parse JSON-RPC request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            warn!(req_id, got = %request.jsonrpc, "Invalid JSON-RPC version");
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    json!({"expected": "2.0", "got": request.jsonrpc}),
                ),
            ));
        }

        let start = std::time::Instant::now();
        let response = self.handle_request(request.clone()).await;
        debug!(
            req_id,
            method = %request.method,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "JSON-RPC request handled"
        );
        response
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_null();
        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "initialized" | "notifications/initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.definitions() })),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        if is_notification {
            if let Err(e) = result {
                warn!(method = %request.method, error = %e, "Notification handling failed");
            }
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("missing 'name' parameter".into()))?;
        let arguments = &params["arguments"];

        info!(tool = %name, "Dispatching tool call");
        let result = self.dispatcher.call(name, arguments).await;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}
