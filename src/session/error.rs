use thiserror::Error;

/// Errors from looking up sessions and dispatching actions
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session registered under this id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Action name not recognized
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}
