//! Messages and actions exchanged with a chat front-end

use super::error::SessionError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Button-style actions offered after a successful start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    ResetAgent,
    ReloadEnv,
    ExitApp,
}

impl ChatAction {
    pub const ALL: [ChatAction; 3] = [Self::ResetAgent, Self::ReloadEnv, Self::ExitApp];

    /// Wire name of the action
    pub fn name(self) -> &'static str {
        match self {
            Self::ResetAgent => "reset_agent",
            Self::ReloadEnv => "reload_env",
            Self::ExitApp => "exit_app",
        }
    }

    /// Button label shown to the user
    pub fn label(self) -> &'static str {
        match self {
            Self::ResetAgent => "🔄 Reset Agent",
            Self::ReloadEnv => "📥 Reload Env",
            Self::ExitApp => "🚪 Exit App",
        }
    }
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChatAction {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| SessionError::UnknownAction(s.to_string()))
    }
}

/// An action button attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    pub name: &'static str,
    pub label: &'static str,
}

impl From<ChatAction> for ActionButton {
    fn from(action: ChatAction) -> Self {
        Self {
            name: action.name(),
            label: action.label(),
        }
    }
}

/// One message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionButton>,
}

impl ChatMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_actions(content: impl Into<String>, actions: &[ChatAction]) -> Self {
        Self {
            content: content.into(),
            actions: actions.iter().copied().map(ActionButton::from).collect(),
        }
    }
}

/// Outcome of an action: messages to show, and whether the process must exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReply {
    pub messages: Vec<ChatMessage>,
    pub terminate: bool,
}
