//! Observability for the room session.
//!
//! Logging goes through `tracing` with `room.session.*` targets; metrics go
//! through the `metrics` facade (see [`metrics`]). Installing a recorder or
//! exporter is left to the embedding process.

pub mod metrics;

use crate::errors::SessionError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "room_session=info,room.session=info";

/// Install a global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. With `json`
/// set, events are emitted as JSON lines.
///
/// # Errors
///
/// Returns `SessionError::Internal` if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<(), SessionError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| SessionError::Internal(format!("Failed to install tracing subscriber: {e}")))
}
