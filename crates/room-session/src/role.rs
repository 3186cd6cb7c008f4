//! Role resolution.
//!
//! Decided once per session: explicit overrides first, then the platform
//! default supplied by the embedding environment.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Which side of the room this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates the room and keeps it alive.
    Host,
    /// Discovers the host's room and joins it.
    Client,
}

impl Role {
    /// Returns the role as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Client => "client",
        }
    }

    /// Build-derived default: development builds host, release builds join.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(debug_assertions) {
            Role::Host
        } else {
            Role::Client
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Role::Host),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Resolve the session role.
///
/// `force_host` wins over `force_client`; with neither set the platform
/// default applies.
#[must_use]
pub fn resolve(force_host: bool, force_client: bool, platform_default: Role) -> Role {
    if force_host {
        Role::Host
    } else if force_client {
        Role::Client
    } else {
        platform_default
    }
}
