//! dbagent: chat with databases through MCP tool servers
//!
//! This library provides:
//! - MCP client over HTTP+SSE for remote database tool servers
//! - Dapr Conversation API model client
//! - Chat agent with tool calling and conversation memory
//! - Per-session lifecycle controller (start, reset, reload, end)
//! - HTTP chat API and terminal chat front-ends

pub mod agent;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod prompt;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use session::{SessionController, SessionRegistry, SessionServices};
