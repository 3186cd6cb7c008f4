//! Mock spawn subsystem.

use room_session::collaborators::SpawnSubsystem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MockSpawnSubsystem {
    enabled: AtomicBool,
    writes: AtomicUsize,
}

impl MockSpawnSubsystem {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SpawnSubsystem for MockSpawnSubsystem {
    fn set_enabled(&self, enabled: bool) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}
