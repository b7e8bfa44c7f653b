//! Typed errors for MCP connections

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    /// The server URL could not be used
    #[error("Invalid MCP server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The event stream ended or was closed while a request was outstanding
    #[error("MCP connection closed")]
    ConnectionClosed,

    /// Operation not valid for the current connection state (e.g. closing twice)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// JSON-RPC error returned by the server
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed or unexpected protocol traffic
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Tolerated during teardown: the handle was already closed or never opened
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, McpError::InvalidState(_))
    }
}
