//! Chat agent with tool execution

mod chat;
mod context;

pub use chat::{Agent, AgentResponse, ToolCallLog, AGENT_NAME, AGENT_ROLE};
pub use context::ConversationContext;
