//! Configuration for dbagent
//!
//! Everything is read from the process environment (optionally seeded from a
//! `.env` file). A [`Config`] is an immutable snapshot: reloading builds a new
//! one from scratch instead of patching the old one.
//!
//! Reloading never writes to the process environment. Values re-read from
//! `.env` are kept in an overlay owned by [`EnvConfigSource`] and consulted
//! before the environment.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Fixed request timeout for the model client, in seconds
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 180;

const DEFAULT_BUCKET_NAME: &str = "travel-sample";
const DEFAULT_LLM_PROVIDER: &str = "openai";
const DEFAULT_LLM_COMPONENT: &str = "openai";
const DEFAULT_DAPR_HTTP_PORT: &str = "3500";

/// A database reachable through a remote MCP tool server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Couchbase,
    Postgres,
}

impl Backend {
    /// All backends, in connection order
    pub const ALL: [Backend; 2] = [Backend::Couchbase, Backend::Postgres];

    /// Server name used when opening the MCP connection
    pub fn server_name(self) -> &'static str {
        match self {
            Self::Couchbase => "couchbase",
            Self::Postgres => "postgres",
        }
    }

    /// Label used in status messages
    pub fn label(self) -> &'static str {
        match self {
            Self::Couchbase => "Couchbase MCP",
            Self::Postgres => "PostgreSQL MCP",
        }
    }

    /// Short prefix used in env keys and reload summaries
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Couchbase => "CB",
            Self::Postgres => "PG",
        }
    }

    pub fn url_key(self) -> &'static str {
        match self {
            Self::Couchbase => "CB_MCP_SERVER_URL",
            Self::Postgres => "PG_MCP_SERVER_URL",
        }
    }

    pub fn active_key(self) -> &'static str {
        match self {
            Self::Couchbase => "CB_MCP_ACTIVE",
            Self::Postgres => "PG_MCP_ACTIVE",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Self::Couchbase => "http://localhost:8000/sse",
            Self::Postgres => "http://localhost:8003/sse",
        }
    }

    /// Optional prompt file appended to the system prompt while active
    pub fn prompt_file(self) -> &'static str {
        match self {
            Self::Couchbase => "couchbase_prompt.txt",
            Self::Postgres => "postgres_prompt.txt",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.server_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfig {
    pub backend: Backend,
    pub url: String,
    pub active: bool,
}

/// Model client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmConfig {
    /// Provider id (informational, shown in logs and status)
    pub provider: String,
    /// Dapr conversation component name
    pub component: String,
    pub timeout_secs: u64,
    /// Base URL of the Dapr sidecar HTTP API
    pub dapr_endpoint: String,
    #[serde(skip)]
    pub api_token: Option<String>,
}

/// Immutable configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub backends: Vec<BackendConfig>,
    pub bucket_name: String,
    pub llm: LlmConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No DB available - both CB_MCP_ACTIVE and PG_MCP_ACTIVE are false")]
    NoActiveBackend,
}

impl Config {
    /// Build configuration from an arbitrary key lookup, applying defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backends = Backend::ALL
            .iter()
            .map(|&backend| BackendConfig {
                backend,
                url: lookup(backend.url_key())
                    .unwrap_or_else(|| backend.default_url().to_string()),
                active: parse_flag(lookup(backend.active_key()), true),
            })
            .collect();

        let dapr_endpoint = lookup("DAPR_HTTP_ENDPOINT").unwrap_or_else(|| {
            let port =
                lookup("DAPR_HTTP_PORT").unwrap_or_else(|| DEFAULT_DAPR_HTTP_PORT.to_string());
            format!("http://127.0.0.1:{}", port)
        });

        Self {
            backends,
            bucket_name: lookup("CB_BUCKET_NAME")
                .unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
            llm: LlmConfig {
                provider: lookup("DAPR_LLM_PROVIDER")
                    .unwrap_or_else(|| DEFAULT_LLM_PROVIDER.to_string()),
                component: lookup("DAPR_LLM_COMPONENT_DEFAULT")
                    .unwrap_or_else(|| DEFAULT_LLM_COMPONENT.to_string()),
                timeout_secs: LLM_REQUEST_TIMEOUT_SECS,
                dapr_endpoint,
                api_token: lookup("DAPR_API_TOKEN").filter(|t| !t.is_empty()),
            },
        }
    }

    pub fn backend(&self, backend: Backend) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.backend == backend)
    }

    pub fn is_active(&self, backend: Backend) -> bool {
        self.backend(backend).map(|b| b.active).unwrap_or(false)
    }

    /// Active backends in connection order
    pub fn active_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.active)
    }

    /// Fail unless at least one backend is active
    pub fn require_active_backend(&self) -> Result<(), ConfigError> {
        if self.active_backends().next().is_none() {
            return Err(ConfigError::NoActiveBackend);
        }
        Ok(())
    }

    /// Summary of the active flags, e.g. `CB_ACTIVE=True, PG_ACTIVE=False`
    pub fn active_summary(&self) -> String {
        self.backends
            .iter()
            .map(|b| format!("{}_ACTIVE={}", b.backend.short_name(), display_flag(b.active)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Flags are shown capitalized in user-facing messages
fn display_flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// A flag is on only when its value is the literal `true` (any case)
pub fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => v.eq_ignore_ascii_case("true"),
        None => default,
    }
}

/// Load `.env` from the working directory without overriding existing variables
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env: {}", e),
    }
}

/// Where a session gets its configuration from
pub trait ConfigSource: Send + Sync {
    /// Current configuration
    fn load(&self) -> Config;

    /// Refresh the underlying source, then build a fresh configuration
    fn reload(&self) -> Result<Config>;
}

/// Process environment, overlaid with the values last re-read from `.env`
#[derive(Debug, Default)]
pub struct EnvConfigSource {
    /// Explicit env file; `None` searches upward for `.env`
    env_file: Option<PathBuf>,
    overrides: RwLock<HashMap<String, String>>,
}

impl EnvConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload from `path` instead of searching for `.env`
    pub fn with_env_file(path: impl Into<PathBuf>) -> Self {
        Self {
            env_file: Some(path.into()),
            overrides: RwLock::default(),
        }
    }

    /// Parse the env file into a map. A missing file yields an empty map.
    fn read_env_file(&self) -> Result<HashMap<String, String>> {
        let opened = match &self.env_file {
            Some(path) => dotenv::from_path_iter(path),
            None => dotenv::dotenv_iter(),
        };
        let iter = match opened {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(HashMap::new()),
            Err(e) => return Err(e).context("Failed to open .env"),
        };

        iter.map(|item| item.context("Failed to parse .env")).collect()
    }

    /// Build a config where overlay values win over `fallback`
    fn build<F>(&self, fallback: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
        Config::from_lookup(|key| overrides.get(key).cloned().or_else(|| fallback(key)))
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> Config {
        self.build(|key| std::env::var(key).ok())
    }

    fn reload(&self) -> Result<Config> {
        let fresh = self.read_env_file()?;
        tracing::info!("Reloaded {} variables from .env", fresh.len());
        *self.overrides.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(self.load())
    }
}
