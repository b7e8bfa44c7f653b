//! Conversation context management

use crate::llm::{Message, ToolCall};

/// Max characters kept from a single tool result (large query results)
const MAX_TOOL_RESULT_CHARS: usize = 32_000;

/// Conversation history for one agent
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    messages: Vec<Message>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system message
    pub fn add_system(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Add an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Add an assistant message with tool calls (must precede the results)
    pub fn add_assistant_tool_calls(&mut self, text: Option<String>, tool_calls: &[ToolCall]) {
        self.messages
            .push(Message::assistant_tool_calls(text, tool_calls.to_vec()));
    }

    /// Add a tool result (auto-truncates if too large)
    pub fn add_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result: &str,
    ) {
        let content = Self::truncate_if_needed(result, MAX_TOOL_RESULT_CHARS);
        self.messages
            .push(Message::tool_result(tool_call_id, name, content));
    }

    fn truncate_if_needed(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }

        let truncated: String = text.chars().take(max_chars).collect();
        format!(
            "{}\n\n... [TRUNCATED: result exceeded {} characters. Narrow the query to see more.]",
            truncated, max_chars
        )
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything after the first `len` messages
    pub fn rollback(&mut self, len: usize) {
        self.messages.truncate(len);
    }
}
