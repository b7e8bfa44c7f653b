//! Adapter exposing a remote MCP tool through the agent's Tool trait.

use super::{Tool, ToolResult};
use crate::mcp::{McpToolDef, ToolClient};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One tool on one MCP server
pub struct McpTool {
    client: Arc<dyn ToolClient>,
    def: McpToolDef,
}

impl McpTool {
    pub fn new(client: Arc<dyn ToolClient>, def: McpToolDef) -> Self {
        Self { client, def }
    }

    /// Server the tool lives on
    pub fn server_name(&self) -> &str {
        self.client.server_name()
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn parameters(&self) -> Value {
        if self.def.input_schema.is_null() {
            serde_json::json!({ "type": "object", "properties": {} })
        } else {
            self.def.input_schema.clone()
        }
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        tracing::debug!(
            "Calling {} on MCP server {}",
            self.def.name,
            self.server_name()
        );

        match self.client.call_tool(&self.def.name, params).await {
            Ok(result) if result.is_error => Ok(ToolResult::error(result.to_text())),
            Ok(result) => Ok(ToolResult::success(result.to_text())),
            Err(e) => Ok(ToolResult::error(format!("MCP call failed: {}", e))),
        }
    }
}
