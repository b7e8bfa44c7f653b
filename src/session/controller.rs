//! Per-session lifecycle: start, message, reset, reload, end
//!
//! A controller owns everything one chat session needs (configuration, open
//! tool clients, agent). Nothing is shared between sessions; front-ends keep
//! one controller per session and feed it events one at a time.
//!
//! ```text
//! UNINITIALIZED --start--> READY --reset/reload--> READY
//!       ^    \               |
//!       |     `--failure--> ERROR --start/reset/reload--> READY
//!       `------end----------'
//! ```

use super::message::{ActionReply, ChatAction, ChatMessage};
use crate::agent::{Agent, AGENT_NAME, AGENT_ROLE};
use crate::config::{Backend, Config, ConfigSource, EnvConfigSource};
use crate::llm::{DaprModelFactory, ModelFactory};
use crate::mcp::{release, SseConnector, ToolClient, ToolServerConnector};
use crate::prompt::PromptLoader;
use crate::tools::ToolRegistry;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const NOT_READY: &str = "Agent not ready. Please refresh the page.";
const NO_RESPONSE: &str = "No response generated.";

/// Collaborators a controller builds sessions from
#[derive(Clone)]
pub struct SessionServices {
    pub connector: Arc<dyn ToolServerConnector>,
    pub models: Arc<dyn ModelFactory>,
    pub config: Arc<dyn ConfigSource>,
    pub prompts: PromptLoader,
}

impl SessionServices {
    /// MCP over SSE, Dapr model clients and the process environment
    pub fn new(prompts: PromptLoader) -> Self {
        Self {
            connector: Arc::new(SseConnector),
            models: Arc::new(DaprModelFactory),
            config: Arc::new(EnvConfigSource::new()),
            prompts,
        }
    }
}

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Uninitialized,
    Ready,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Ready => "READY",
            Self::Error => "ERROR",
        })
    }
}

/// Tool count reported by one connected backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendTools {
    pub server: &'static str,
    pub label: &'static str,
    pub tools: usize,
}

struct OpenClient {
    backend: Backend,
    client: Arc<dyn ToolClient>,
}

struct ActiveSession {
    clients: Vec<OpenClient>,
    agent: Agent,
}

enum SessionState {
    Uninitialized,
    Ready(ActiveSession),
    Error(String),
}

/// Lifecycle controller for one chat session
pub struct SessionController {
    id: Uuid,
    services: SessionServices,
    config: Option<Config>,
    state: SessionState,
}

impl SessionController {
    pub fn new(services: SessionServices) -> Self {
        Self {
            id: Uuid::new_v4(),
            services,
            config: None,
            state: SessionState::Uninitialized,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Ready(_) => SessionStatus::Ready,
            SessionState::Error(_) => SessionStatus::Error,
        }
    }

    /// Failure text of the last initialization, while in ERROR
    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Configuration snapshot the session currently runs with
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// Identity of the live agent, if any
    pub fn agent_id(&self) -> Option<Uuid> {
        match &self.state {
            SessionState::Ready(active) => Some(active.agent.id()),
            _ => None,
        }
    }

    /// Tool counts per connected backend, in connection order
    pub fn backend_tools(&self) -> Vec<BackendTools> {
        match &self.state {
            SessionState::Ready(active) => active
                .clients
                .iter()
                .map(|open| BackendTools {
                    server: open.backend.server_name(),
                    label: open.backend.label(),
                    tools: open.client.tools().len(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Names of every tool the agent can call
    pub fn tool_names(&self) -> Vec<String> {
        match &self.state {
            SessionState::Ready(active) => active
                .agent
                .tools()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Chat start: load configuration and bring the session to READY
    pub async fn start(&mut self) -> ChatMessage {
        let config = self.services.config.load();
        tracing::info!("Starting session {} ({})", self.id, config.active_summary());
        self.config = Some(config.clone());

        match self.initialize(&config).await {
            Ok(()) => ChatMessage::with_actions(self.connected_status(), &ChatAction::ALL),
            Err(e) => ChatMessage::text(format!("Failed to connect to MCP servers: {:#}", e)),
        }
    }

    /// Forward a user message to the agent
    pub async fn message(&mut self, text: &str) -> ChatMessage {
        let SessionState::Ready(active) = &mut self.state else {
            return ChatMessage::text(NOT_READY);
        };

        match active.agent.run(text).await {
            Ok(response) => {
                let calls: Vec<String> =
                    response.tool_call_log.iter().map(|c| c.to_string()).collect();
                tracing::debug!(
                    "Agent answered after {} tool calls [{}]",
                    response.tool_calls_made,
                    calls.join(", ")
                );
                ChatMessage::text(response.content.unwrap_or_else(|| NO_RESPONSE.to_string()))
            }
            Err(e) => {
                tracing::warn!("Message failed in session {}: {:#}", self.id, e);
                ChatMessage::text(format!("Error: {:#}", e))
            }
        }
    }

    /// Run one of the start message's actions
    pub async fn action(&mut self, action: ChatAction) -> ActionReply {
        match action {
            ChatAction::ResetAgent => ActionReply {
                messages: self.reset().await,
                terminate: false,
            },
            ChatAction::ReloadEnv => ActionReply {
                messages: self.reload().await,
                terminate: false,
            },
            // Exit skips teardown; the front-end terminates right away
            ChatAction::ExitApp => ActionReply {
                messages: vec![ChatMessage::text("🚪 Shutting down application...")],
                terminate: true,
            },
        }
    }

    /// Rebuild clients and agent from the current configuration
    pub async fn reset(&mut self) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::text("🔄 Resetting agent...")];

        let config = match &self.config {
            Some(config) => config.clone(),
            None => self.services.config.load(),
        };
        self.config = Some(config.clone());

        messages.push(match self.initialize(&config).await {
            Ok(()) => ChatMessage::text(format!(
                "✅ Agent reset! Ready to query '{}'.",
                config.bucket_name
            )),
            Err(e) => ChatMessage::text(format!("❌ Reset failed: {:#}", e)),
        });
        messages
    }

    /// Refresh the configuration source, then rebuild from the new configuration
    pub async fn reload(&mut self) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::text("📥 Reloading environment...")];

        let config = match self.services.config.reload() {
            Ok(config) => config,
            Err(e) => {
                messages.push(ChatMessage::text(format!("❌ Reload failed: {:#}", e)));
                return messages;
            }
        };
        self.config = Some(config.clone());

        messages.push(match self.initialize(&config).await {
            Ok(()) => ChatMessage::text(format!(
                "✅ Environment reloaded! {}",
                config.active_summary()
            )),
            Err(e) => ChatMessage::text(format!("❌ Reload failed: {:#}", e)),
        });
        messages
    }

    /// Chat end: close every client and return to UNINITIALIZED
    pub async fn end(&mut self) {
        self.teardown().await;
        self.config = None;
        tracing::info!("Session {} ended", self.id);
    }

    /// Full rebuild. Old clients are closed before any new one is opened;
    /// on failure nothing stays open and the state is ERROR.
    async fn initialize(&mut self, config: &Config) -> Result<()> {
        self.teardown().await;

        let mut clients = Vec::new();
        match self.build(config, &mut clients).await {
            Ok(agent) => {
                tracing::info!(
                    "Session {} ready: agent {} on {} with {} tools",
                    self.id,
                    agent.id(),
                    agent.provider_name(),
                    agent.tools().len()
                );
                self.state = SessionState::Ready(ActiveSession { clients, agent });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Session {} failed to initialize: {:#}", self.id, e);
                close_all(&clients).await;
                self.state = SessionState::Error(format!("{:#}", e));
                Err(e)
            }
        }
    }

    async fn build(&self, config: &Config, clients: &mut Vec<OpenClient>) -> Result<Agent> {
        config.require_active_backend()?;

        for backend in config.active_backends() {
            let client = self
                .services
                .connector
                .open(backend.backend.server_name(), &backend.url)
                .await?;
            clients.push(OpenClient {
                backend: backend.backend,
                client,
            });
        }

        let instructions = self.services.prompts.load(config)?;
        let llm = self.services.models.create(&config.llm)?;

        let handles: Vec<Arc<dyn ToolClient>> =
            clients.iter().map(|open| open.client.clone()).collect();
        let tools = ToolRegistry::from_clients(&handles);

        Ok(Agent::new(AGENT_NAME, AGENT_ROLE, instructions, llm, tools))
    }

    async fn teardown(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Uninitialized);
        if let SessionState::Ready(active) = previous {
            close_all(&active.clients).await;
        }
    }

    fn connected_status(&self) -> String {
        let parts: Vec<String> = self
            .backend_tools()
            .iter()
            .map(|b| format!("{} ({} tools)", b.label, b.tools))
            .collect();
        format!("Connected to: {}. Ask me anything!", parts.join(", "))
    }
}

async fn close_all(clients: &[OpenClient]) {
    for open in clients {
        release(open.client.as_ref()).await;
    }
}
