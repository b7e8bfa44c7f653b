//! Chat session lifecycle

mod controller;
mod error;
mod message;
mod registry;

pub use controller::{BackendTools, SessionController, SessionServices, SessionStatus};
pub use error::SessionError;
pub use message::{ActionButton, ActionReply, ChatAction, ChatMessage};
pub use registry::{SessionHandle, SessionInfo, SessionRegistry};
