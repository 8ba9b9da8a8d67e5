//! Authenticated command bridge between tool-calling callers and a
//! design-tool peer.
//!
//! - [`server`] accepts WebSocket peers and runs one task per connection.
//! - [`bridge`] tracks the single active peer and correlates commands with
//!   replies.
//! - [`dispatcher`] turns tool calls into commands and outcomes into
//!   envelopes; [`mcp`] exposes it over JSON-RPC.
//! - [`store`] caches catalogs the peer pushes.

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mcp;
pub mod server;
pub mod session;
pub mod store;

pub use bridge::{Bridge, ConnectionId, PendingReply};
pub use config::{Cli, Config};
pub use dispatcher::{Dispatcher, ToolResult};
pub use error::BridgeError;
pub use mcp::McpServer;
pub use store::{CatalogStore, SharedCatalogs};
