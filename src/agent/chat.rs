//! Database agent: a model client, instructions and the MCP tool list

use super::context::ConversationContext;
use crate::llm::{LlmProvider, LlmResponse};
use crate::tools::ToolRegistry;
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Default agent name
pub const AGENT_NAME: &str = "DBAgent";

/// Default agent role
pub const AGENT_ROLE: &str = "Database Expert";

const DEFAULT_MAX_ITERATIONS: usize = 10;

const MAX_STEPS_NOTICE: &str = "I've reached the maximum number of steps. \
    Here's what I've done so far. Let me know if you'd like me to continue.";

/// A single tool call log entry
#[derive(Debug, Clone)]
pub struct ToolCallLog {
    pub tool: String,
    pub success: bool,
}

impl std::fmt::Display for ToolCallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.success { "ok" } else { "error" };
        write!(f, "{} ({})", self.tool, outcome)
    }
}

/// Response from the agent
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Final answer; `None` when the model produced no text
    pub content: Option<String>,
    pub tool_calls_made: usize,
    pub tool_call_log: Vec<ToolCallLog>,
}

/// Chat agent that answers with the help of database tools
pub struct Agent {
    id: Uuid,
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    context: ConversationContext,
    max_iterations: usize,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        instructions: impl Into<String>,
        llm: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
    ) -> Self {
        let name: String = name.into();
        let role: String = role.into();
        let instructions: String = instructions.into();

        let mut context = ConversationContext::new();
        context.add_system(system_prompt(&name, &role, &instructions));

        Self {
            id: Uuid::new_v4(),
            llm,
            tools,
            context,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Identity of this instance; a rebuilt agent always gets a new one
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    /// Number of messages in the conversation, system prompt included
    pub fn history_len(&self) -> usize {
        self.context.len()
    }

    /// Answer one user message, calling tools as the model requests.
    ///
    /// On failure the conversation is rolled back to where it was before the
    /// call, so the agent stays usable for the next message.
    pub async fn run(&mut self, user_message: &str) -> Result<AgentResponse> {
        let checkpoint = self.context.len();
        match self.run_turn(user_message).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!("Agent run failed, discarding partial turn: {:#}", e);
                self.context.rollback(checkpoint);
                Err(e)
            }
        }
    }

    async fn run_turn(&mut self, user_message: &str) -> Result<AgentResponse> {
        self.context.add_user(user_message);

        let tool_definitions = self.tools.definitions();
        let mut iterations = 0;
        let mut total_tool_calls = 0;
        let mut tool_call_log: Vec<ToolCallLog> = Vec::new();

        loop {
            if iterations >= self.max_iterations {
                tracing::warn!("Agent hit max iterations ({})", self.max_iterations);
                self.context.add_assistant(MAX_STEPS_NOTICE);
                return Ok(AgentResponse {
                    content: Some(MAX_STEPS_NOTICE.to_string()),
                    tool_calls_made: total_tool_calls,
                    tool_call_log,
                });
            }

            let tools = if tool_definitions.is_empty() {
                None
            } else {
                Some(tool_definitions.as_slice())
            };
            let response = self.llm.chat(self.context.messages(), tools).await?;
            iterations += 1;

            let (text, calls) = match response {
                LlmResponse::Text { text } => {
                    self.context.add_assistant(&text);
                    return Ok(AgentResponse {
                        content: Some(text).filter(|t| !t.is_empty()),
                        tool_calls_made: total_tool_calls,
                        tool_call_log,
                    });
                }
                LlmResponse::ToolCalls { calls } => (None, calls),
                LlmResponse::Mixed { text, tool_calls } => (text, tool_calls),
            };

            total_tool_calls += calls.len();
            self.context.add_assistant_tool_calls(text, &calls);

            for call in &calls {
                tracing::debug!("Executing tool: {} with args: {}", call.name, call.arguments);

                let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                if !result.success {
                    tracing::debug!("Tool {} returned error: {}", call.name, result.output);
                }

                self.context
                    .add_tool_result(&call.id, &call.name, &result.output);
                tool_call_log.push(ToolCallLog {
                    tool: call.name.clone(),
                    success: result.success,
                });
            }
        }
    }
}

fn system_prompt(name: &str, role: &str, instructions: &str) -> String {
    format!(
        "Your name is {}.\nYour role is {}.\n\n{}",
        name, role, instructions
    )
}
