//! MCP client handles for remote tool servers (async).

use super::error::McpError;
use super::transport::SseTransport;
use super::types::{
    InitializeResult, ListToolsPage, McpToolDef, McpToolResult, ServerInfo, PROTOCOL_VERSION,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// An open connection to one remote tool server
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Name the connection was opened under
    fn server_name(&self) -> &str;

    /// Tools the server reported when the connection was opened
    fn tools(&self) -> &[McpToolDef];

    /// Invoke a tool on the server
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError>;

    /// Release the connection. Closing an already-closed handle yields
    /// [`McpError::InvalidState`].
    async fn close(&self) -> Result<(), McpError>;
}

/// Opens tool client handles
#[async_trait]
pub trait ToolServerConnector: Send + Sync {
    async fn open(&self, server_name: &str, url: &str) -> Result<Arc<dyn ToolClient>>;
}

/// Connector for MCP servers speaking HTTP+SSE
#[derive(Debug, Default, Clone, Copy)]
pub struct SseConnector;

#[async_trait]
impl ToolServerConnector for SseConnector {
    async fn open(&self, server_name: &str, url: &str) -> Result<Arc<dyn ToolClient>> {
        let client = McpClient::connect(server_name, url)
            .await
            .with_context(|| format!("{} ({})", server_name, url))?;
        Ok(Arc::new(client))
    }
}

/// MCP client bound to one server over SSE
pub struct McpClient {
    server_name: String,
    transport: SseTransport,
    server_info: ServerInfo,
    tools: Vec<McpToolDef>,
}

impl McpClient {
    /// Connect, run the initialize handshake and discover tools
    pub async fn connect(server_name: &str, url: &str) -> Result<Self, McpError> {
        let transport = SseTransport::connect(url).await?;

        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;
        let init: InitializeResult = serde_json::from_value(init)?;

        transport.notify("notifications/initialized", None).await?;

        let tools = if init.capabilities.tools.is_some() {
            list_all_tools(&transport).await?
        } else {
            tracing::warn!("MCP server {} does not advertise tools", server_name);
            Vec::new()
        };

        tracing::info!(
            "Connected to MCP server: {} ({} tools, protocol {})",
            server_name,
            tools.len(),
            init.protocol_version
        );

        Ok(Self {
            server_name: server_name.to_string(),
            transport,
            server_info: init.server_info,
            tools,
        })
    }

    /// Identity the server reported during the handshake
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

/// Follow `tools/list` pagination until the server stops returning a cursor
async fn list_all_tools(transport: &SseTransport) -> Result<Vec<McpToolDef>, McpError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let page: ListToolsPage =
            serde_json::from_value(transport.request("tools/list", params).await?)?;
        tools.extend(page.tools);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok(tools)
}

#[async_trait]
impl ToolClient for McpClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments
                })),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    async fn close(&self) -> Result<(), McpError> {
        self.transport.close().await?;
        tracing::info!("Disconnected from MCP server: {}", self.server_name);
        Ok(())
    }
}

/// Close a handle, tolerating the "already closed" class.
///
/// Other close failures are logged but never raised: teardown always
/// continues with the next handle.
pub async fn release(client: &dyn ToolClient) {
    match client.close().await {
        Ok(()) => {}
        Err(e) if e.is_invalid_state() => {
            tracing::debug!("MCP client {} already closed: {}", client.server_name(), e);
        }
        Err(e) => {
            tracing::warn!("Failed to close MCP client {}: {}", client.server_name(), e);
        }
    }
}
