//! Test fixtures for room session tests.

use crate::{MockAvatarService, MockDirectory, MockSpawnSubsystem, MockVoiceRelay};
use room_session::collaborators::{Collaborators, RoomCandidate, RoomHandle};
use room_session::config::Config;
use room_session::role::Role;
use std::sync::Arc;
use std::time::Duration;

/// Fixed test config: the given role forced, 1s ping, 2s discovery, 10s join
/// timeout, 100ms tick.
#[must_use]
pub fn test_config(role: Role, room_name: &str) -> Config {
    Config {
        peer_id: "peer-test-001".to_string(),
        room_name: room_name.to_string(),
        force_host: role == Role::Host,
        force_client: role == Role::Client,
        platform_role: Role::Client,
        public: true,
        voice_enabled: true,
        avatar_hidden: true,
        ping_interval: Duration::from_secs(1),
        discovery_interval: Duration::from_secs(2),
        join_timeout: Duration::from_secs(10),
        tick_interval: Duration::from_millis(100),
    }
}

#[must_use]
pub fn host_config(room_name: &str) -> Config {
    test_config(Role::Host, room_name)
}

#[must_use]
pub fn client_config(room_name: &str) -> Config {
    test_config(Role::Client, room_name)
}

/// Room handle with a derived id.
#[must_use]
pub fn room(name: &str, join_code: &str) -> RoomHandle {
    RoomHandle::new(format!("room-{join_code}"), name, join_code)
}

#[must_use]
pub fn candidate(name: &str, join_code: &str) -> RoomCandidate {
    RoomCandidate::new(name, join_code)
}

/// One instance of every mock collaborator.
#[derive(Debug, Clone)]
pub struct MockCollaborators {
    pub directory: Arc<MockDirectory>,
    pub voice: Arc<MockVoiceRelay>,
    pub avatars: Arc<MockAvatarService>,
    pub spawner: Arc<MockSpawnSubsystem>,
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCollaborators {
    #[must_use]
    pub fn new() -> Self {
        Self {
            directory: MockDirectory::new(),
            voice: MockVoiceRelay::new(),
            avatars: MockAvatarService::new(),
            spawner: MockSpawnSubsystem::new(),
        }
    }

    /// All four mocks wired into a `Collaborators` set.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new()
            .with_directory(self.directory.clone())
            .with_voice(self.voice.clone())
            .with_avatars(self.avatars.clone())
            .with_spawner(self.spawner.clone())
    }

    /// Everything except the directory client.
    #[must_use]
    pub fn without_directory(&self) -> Collaborators {
        Collaborators::new()
            .with_voice(self.voice.clone())
            .with_avatars(self.avatars.clone())
            .with_spawner(self.spawner.clone())
    }

    /// Total live subscriptions across all notification sources.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.directory.subscriber_count()
            + self.voice.subscriber_count()
            + self.avatars.subscriber_count()
    }
}
