//! Message types for the session actor.
//!
//! Requests travel over `tokio::sync::mpsc`; replies come back on
//! `tokio::sync::oneshot`.

use crate::controller::SessionStatus;
use tokio::sync::oneshot;

/// Messages sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Get a snapshot of the session.
    GetStatus {
        respond_to: oneshot::Sender<SessionStatus>,
    },

    /// Force room creation (host only, when not joined).
    CreateRoom {
        /// `true` if a create was issued.
        respond_to: oneshot::Sender<bool>,
    },

    /// Flip host avatar visibility.
    ToggleHostAvatar {
        /// New hidden state, `None` for clients.
        respond_to: oneshot::Sender<Option<bool>>,
    },

    /// Change the voice relay policy.
    SetVoiceEnabled {
        enabled: bool,
        respond_to: oneshot::Sender<()>,
    },

    /// Tear the session down and stop the actor.
    Shutdown { respond_to: oneshot::Sender<()> },
}
