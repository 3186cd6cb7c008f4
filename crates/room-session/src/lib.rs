//! Room Session Library
//!
//! Coordinates a small set of peers around a single shared room hosted by an
//! external room directory service:
//!
//! - Role resolution (host creates the room, clients discover and join it)
//! - Periodic room discovery with exact name matching
//! - Keepalive pings and reconnection after an unacknowledged ping
//! - Join rejection recovery (clients rediscover, hosts retry with backoff)
//! - Post-join configuration of voice relay, avatars and the spawn subsystem
//!
//! # Architecture
//!
//! ```text
//! SessionActor (one per process, single tokio task)
//! └── SessionController (state machine, owns Session state)
//!     ├── DiscoveryLoop (client only, fixed-interval discovery)
//!     └── PostJoinConfigurator (voice / avatar / spawn reactions)
//! ```
//!
//! Collaborators (directory client, voice relay, avatar service, spawn
//! subsystem) are injected as trait objects. Their asynchronous
//! notifications are marshalled onto the actor task through an
//! [`collaborators::EventSink`], so the controller itself never locks.
//!
//! # Modules
//!
//! - [`actors`] - Session actor and its handle
//! - [`collaborators`] - Collaborator traits and notification types
//! - [`config`] - Configuration from environment
//! - [`configurator`] - Post-join configuration reactions
//! - [`controller`] - Session state machine
//! - [`discovery`] - Discovery loop
//! - [`errors`] - Error types
//! - [`observability`] - Tracing setup and metrics
//! - [`role`] - Role resolution

pub mod actors;
pub mod collaborators;
pub mod config;
pub mod configurator;
pub mod controller;
pub mod discovery;
pub mod errors;
pub mod observability;
pub mod role;
