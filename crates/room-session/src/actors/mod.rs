//! Session actor.
//!
//! A single tokio task owns the [`crate::controller::SessionController`] and
//! serializes everything that touches it:
//!
//! - scheduling ticks from a `tokio::time::interval`
//! - collaborator notifications drained from the [`crate::collaborators::EventSink`] queue
//! - commands from [`SessionActorHandle`]
//!
//! Cancellation tears the session down and releases all subscriptions.

pub mod messages;
pub mod session;

pub use messages::SessionMessage;
pub use session::{SessionActor, SessionActorHandle};
