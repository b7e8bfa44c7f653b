//! In-memory collaborators for session tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use dbagent_cli::config::{Config, ConfigSource, LlmConfig};
use dbagent_cli::llm::{LlmProvider, LlmResponse, Message, ModelFactory, Role, ToolDefinition};
use dbagent_cli::mcp::{
    McpContent, McpError, McpToolDef, McpToolResult, ToolClient, ToolServerConnector,
};
use dbagent_cli::prompt::PromptLoader;
use dbagent_cli::session::SessionServices;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Build a configuration from `KEY=value` pairs, defaults for the rest
pub fn config_from(pairs: &[(&str, &str)]) -> Config {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |key| map.get(key).cloned())
}

/// Configuration source whose reload yields whatever the test staged
pub struct StaticConfig {
    current: Mutex<Config>,
    staged: Mutex<Option<Config>>,
    fail_reload: AtomicBool,
}

impl StaticConfig {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(config),
            staged: Mutex::new(None),
            fail_reload: AtomicBool::new(false),
        })
    }

    /// Configuration the next reload will produce
    pub fn stage(&self, config: Config) {
        *self.staged.lock().unwrap() = Some(config);
    }

    pub fn fail_reload(&self) {
        self.fail_reload.store(true, Ordering::SeqCst);
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self) -> Config {
        self.current.lock().unwrap().clone()
    }

    fn reload(&self) -> Result<Config> {
        if self.fail_reload.load(Ordering::SeqCst) {
            anyhow::bail!("Failed to parse .env");
        }
        if let Some(next) = self.staged.lock().unwrap().take() {
            *self.current.lock().unwrap() = next;
        }
        Ok(self.load())
    }
}

/// One fake tool server handle
pub struct FakeClient {
    server_name: String,
    tools: Vec<McpToolDef>,
    closed: AtomicBool,
    close_error: Option<String>,
    hub: Arc<FakeHub>,
}

#[async_trait]
impl ToolClient for FakeClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        self.hub.tool_calls.fetch_add(1, Ordering::SeqCst);
        Ok(McpToolResult {
            content: vec![McpContent::Text {
                text: format!("{}:{} {}", self.server_name, name, arguments),
            }],
            is_error: false,
        })
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(McpError::InvalidState("already closed".to_string()));
        }
        self.hub.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.close_error {
            return Err(McpError::Protocol(message.clone()));
        }
        Ok(())
    }
}

impl FakeClient {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct ServerSpec {
    tools: usize,
    refuse: bool,
    close_error: Option<String>,
}

/// Connector that hands out [`FakeClient`]s and counts what happens to them
#[derive(Default)]
pub struct FakeHub {
    servers: Mutex<HashMap<String, ServerSpec>>,
    opened: Mutex<Vec<Arc<FakeClient>>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub tool_calls: AtomicUsize,
}

impl FakeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `tools` tools under `server_name`
    pub fn serve(&self, server_name: &str, tools: usize) {
        self.servers.lock().unwrap().insert(
            server_name.to_string(),
            ServerSpec {
                tools,
                ..Default::default()
            },
        );
    }

    /// Refuse connections to `server_name`
    pub fn refuse(&self, server_name: &str) {
        self.servers
            .lock()
            .unwrap()
            .entry(server_name.to_string())
            .or_default()
            .refuse = true;
    }

    /// Fail closing handles of `server_name` with a non-tolerated error
    pub fn fail_close(&self, server_name: &str, message: &str) {
        self.servers
            .lock()
            .unwrap()
            .entry(server_name.to_string())
            .or_default()
            .close_error = Some(message.to_string());
    }

    pub fn opened(&self) -> Vec<Arc<FakeClient>> {
        self.opened.lock().unwrap().clone()
    }

    /// Handles opened so far that have not been closed
    pub fn open_handles(&self) -> usize {
        self.opened().iter().filter(|c| !c.is_closed()).count()
    }
}

/// Connector facade over a shared hub
pub struct FakeConnector(pub Arc<FakeHub>);

#[async_trait]
impl ToolServerConnector for FakeConnector {
    async fn open(&self, server_name: &str, url: &str) -> Result<Arc<dyn ToolClient>> {
        let hub = self.0.clone();
        hub.opens.fetch_add(1, Ordering::SeqCst);

        let (tools, refuse, close_error) = {
            let servers = hub.servers.lock().unwrap();
            match servers.get(server_name) {
                Some(spec) => (spec.tools, spec.refuse, spec.close_error.clone()),
                None => (0, true, None),
            }
        };
        if refuse {
            anyhow::bail!("{} ({}): connection refused", server_name, url);
        }

        let client = Arc::new(FakeClient {
            server_name: server_name.to_string(),
            tools: (0..tools)
                .map(|i| McpToolDef {
                    name: format!("{}_tool_{}", server_name, i),
                    description: format!("Tool {} of {}", i, server_name),
                    input_schema: json!({ "type": "object", "properties": {} }),
                })
                .collect(),
            closed: AtomicBool::new(false),
            close_error,
            hub: hub.clone(),
        });
        hub.opened.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Model that answers by echoing the last user message.
///
/// A message containing `explode` fails the call; one starting with `call `
/// requests the named tool first.
pub struct EchoModel {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let last_role = messages.last().map(|m| m.role);

        if last_role == Some(Role::Tool) {
            return Ok(LlmResponse::Text {
                text: format!("tool said {}", last),
            });
        }
        if last.contains("explode") {
            anyhow::bail!("model backend exploded");
        }
        if last == "silence" {
            return Ok(LlmResponse::Text {
                text: String::new(),
            });
        }
        if let Some(tool) = last.strip_prefix("call ") {
            return Ok(LlmResponse::from_parts(
                None,
                vec![dbagent_cli::llm::ToolCall {
                    id: "call_0".to_string(),
                    name: tool.to_string(),
                    arguments: json!({ "limit": 1 }),
                }],
            ));
        }

        Ok(LlmResponse::Text {
            text: format!("echo: {}", last),
        })
    }
}

pub struct EchoModels {
    pub calls: Arc<AtomicUsize>,
    pub created: AtomicUsize,
}

impl EchoModels {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
        })
    }
}

impl ModelFactory for EchoModels {
    fn create(&self, _config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(EchoModel {
            calls: self.calls.clone(),
        }))
    }
}

/// Prompt directory holding only the base prompt
pub fn prompt_dir(base: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("system_prompt.txt"), base).unwrap();
    dir
}

/// Everything a session test needs, wired together
pub struct Harness {
    pub hub: Arc<FakeHub>,
    pub models: Arc<EchoModels>,
    pub config: Arc<StaticConfig>,
    pub prompts: TempDir,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        Self {
            hub: FakeHub::new(),
            models: EchoModels::new(),
            config: StaticConfig::new(config),
            prompts: prompt_dir("You answer database questions."),
        }
    }

    pub fn services(&self) -> SessionServices {
        SessionServices {
            connector: Arc::new(FakeConnector(self.hub.clone())),
            models: self.models.clone(),
            config: self.config.clone(),
            prompts: PromptLoader::new(self.prompts.path()),
        }
    }

    pub fn model_calls(&self) -> usize {
        self.models.calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.hub.opens.load(Ordering::SeqCst)
    }
}
