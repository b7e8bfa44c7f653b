//! MCP (Model Context Protocol) client implementation.
//!
//! Connects to remote MCP servers over HTTP+SSE so the agent can use the
//! database tools they expose.

pub mod client;
pub mod error;
pub mod sse;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::{release, McpClient, SseConnector, ToolClient, ToolServerConnector};
pub use error::McpError;
pub use transport::SseTransport;
pub use types::{McpContent, McpToolDef, McpToolResult};
