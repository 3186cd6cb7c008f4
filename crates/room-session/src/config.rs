//! Room session configuration.
//!
//! Configuration is loaded from environment variables. Every field has a
//! default, so an empty environment yields a usable configuration.

use crate::role::Role;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default room name shared by host and clients.
pub const DEFAULT_ROOM_NAME: &str = "Experiment Room";

/// Default keepalive ping interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between discovery queries.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// Default time a join may stay unanswered before it counts as rejected.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default actor tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default peer ID prefix.
pub const DEFAULT_PEER_ID_PREFIX: &str = "peer";

/// Room session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of this process in logs.
    pub peer_id: String,

    /// Name of the room the host creates and clients look for.
    pub room_name: String,

    /// Force the host role regardless of platform.
    pub force_host: bool,

    /// Force the client role regardless of platform (loses to `force_host`).
    pub force_client: bool,

    /// Role used when neither override is set.
    pub platform_role: Role,

    /// Whether the host publishes the room it creates.
    pub public: bool,

    /// Whether voice relay peer connections are active.
    pub voice_enabled: bool,

    /// Whether the host's own avatar is hidden.
    pub avatar_hidden: bool,

    /// Keepalive ping interval (default: 1s).
    pub ping_interval: Duration,

    /// Interval between discovery queries (default: 2s).
    pub discovery_interval: Duration,

    /// Join response deadline (default: 10s).
    pub join_timeout: Duration,

    /// Actor tick period (default: 100ms).
    pub tick_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_id: generate_peer_id(),
            room_name: DEFAULT_ROOM_NAME.to_string(),
            force_host: false,
            force_client: false,
            platform_role: Role::platform_default(),
            public: true,
            voice_enabled: true,
            avatar_hidden: true,
            ping_interval: DEFAULT_PING_INTERVAL,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let room_name = vars
            .get("ROOM_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_string());
        if room_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "ROOM_NAME must not be empty".to_string(),
            ));
        }

        let platform_role = match vars.get("ROOM_PLATFORM_ROLE") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("ROOM_PLATFORM_ROLE: {e}")))?,
            None => Role::platform_default(),
        };

        let peer_id = vars
            .get("ROOM_PEER_ID")
            .cloned()
            .unwrap_or_else(generate_peer_id);

        Ok(Config {
            peer_id,
            room_name,
            force_host: parse_bool(vars, "ROOM_FORCE_HOST", false)?,
            force_client: parse_bool(vars, "ROOM_FORCE_CLIENT", false)?,
            platform_role,
            public: parse_bool(vars, "ROOM_PUBLIC", true)?,
            voice_enabled: parse_bool(vars, "ROOM_VOICE_ENABLED", true)?,
            avatar_hidden: parse_bool(vars, "ROOM_AVATAR_HIDDEN", true)?,
            ping_interval: parse_interval(vars, "ROOM_PING_INTERVAL_MS", DEFAULT_PING_INTERVAL)?,
            discovery_interval: parse_interval(
                vars,
                "ROOM_DISCOVERY_INTERVAL_MS",
                DEFAULT_DISCOVERY_INTERVAL,
            )?,
            join_timeout: parse_interval(vars, "ROOM_JOIN_TIMEOUT_MS", DEFAULT_JOIN_TIMEOUT)?,
            tick_interval: parse_interval(vars, "ROOM_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL)?,
        })
    }

    /// Role this configuration resolves to.
    #[must_use]
    pub fn role(&self) -> Role {
        crate::role::resolve(self.force_host, self.force_client, self.platform_role)
    }
}

fn generate_peer_id() -> String {
    let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
    let uuid_suffix = uuid::Uuid::new_v4().to_string();
    let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
    format!("{DEFAULT_PEER_ID_PREFIX}-{hostname}-{short_suffix}")
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue(format!(
            "{key} must be true/false/1/0, got '{v}'"
        ))),
    }
}

fn parse_interval(
    vars: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };
    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{key}: {e}")))?;
    if millis == 0 {
        return Err(ConfigError::InvalidValue(format!("{key} must be > 0")));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.room_name, DEFAULT_ROOM_NAME);
        assert!(!config.force_host);
        assert!(!config.force_client);
        assert_eq!(config.platform_role, Role::platform_default());
        assert!(config.public);
        assert!(config.voice_enabled);
        assert!(config.avatar_hidden);
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.discovery_interval, Duration::from_secs(2));
        assert_eq!(config.join_timeout, Duration::from_secs(10));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert!(config.peer_id.starts_with("peer-"));
    }

    #[test]
    fn test_custom_values() {
        let config = Config::from_vars(&vars(&[
            ("ROOM_NAME", "Lab"),
            ("ROOM_PEER_ID", "peer-test-001"),
            ("ROOM_FORCE_CLIENT", "1"),
            ("ROOM_PLATFORM_ROLE", "host"),
            ("ROOM_PUBLIC", "false"),
            ("ROOM_VOICE_ENABLED", "0"),
            ("ROOM_AVATAR_HIDDEN", "FALSE"),
            ("ROOM_PING_INTERVAL_MS", "500"),
            ("ROOM_DISCOVERY_INTERVAL_MS", "3000"),
            ("ROOM_JOIN_TIMEOUT_MS", "4000"),
            ("ROOM_TICK_INTERVAL_MS", "50"),
        ]))
        .unwrap();

        assert_eq!(config.room_name, "Lab");
        assert_eq!(config.peer_id, "peer-test-001");
        assert!(config.force_client);
        assert_eq!(config.platform_role, Role::Host);
        assert_eq!(config.role(), Role::Client);
        assert!(!config.public);
        assert!(!config.voice_enabled);
        assert!(!config.avatar_hidden);
        assert_eq!(config.ping_interval, Duration::from_millis(500));
        assert_eq!(config.discovery_interval, Duration::from_secs(3));
        assert_eq!(config.join_timeout, Duration::from_secs(4));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_force_host_wins_over_force_client() {
        let config = Config::from_vars(&vars(&[
            ("ROOM_FORCE_HOST", "true"),
            ("ROOM_FORCE_CLIENT", "true"),
            ("ROOM_PLATFORM_ROLE", "client"),
        ]))
        .unwrap();
        assert_eq!(config.role(), Role::Host);
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let result = Config::from_vars(&vars(&[("ROOM_FORCE_HOST", "yes")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("ROOM_FORCE_HOST")));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let result = Config::from_vars(&vars(&[("ROOM_PING_INTERVAL_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = Config::from_vars(&vars(&[("ROOM_DISCOVERY_INTERVAL_MS", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("> 0")));
    }

    #[test]
    fn test_empty_room_name_rejected() {
        let result = Config::from_vars(&vars(&[("ROOM_NAME", "   ")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_unknown_platform_role_rejected() {
        let result = Config::from_vars(&vars(&[("ROOM_PLATFORM_ROLE", "facilitator")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("ROOM_PLATFORM_ROLE")));
    }
}
