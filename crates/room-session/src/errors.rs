//! Room session error types.
//!
//! Only configuration problems are fatal. Everything the directory reports at
//! runtime (rejections, missed discoveries, lost pings) is handled inside the
//! controller and never surfaces here.

use crate::config::ConfigError;
use thiserror::Error;

/// Room session error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required collaborator was not supplied.
    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session actor is no longer running.
    #[error("Session actor unavailable: {0}")]
    ActorUnavailable(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether the error prevents the session from ever starting.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::MissingCollaborator(_) | SessionError::Config(_)
        )
    }
}
