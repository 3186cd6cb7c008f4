//! Client-side room discovery.
//!
//! The loop is polled on every controller tick while the client is
//! discovering. It issues a query only once per `interval` and matches
//! responses against the configured room name exactly; the first match in
//! response order wins. A miss is not an error, the next interval simply
//! queries again. There is no backoff.

use crate::collaborators::{DirectoryClient, RoomCandidate};
use crate::observability::metrics;
use std::time::{Duration, Instant};
use tracing::debug;

/// Fixed-interval discovery query driver.
#[derive(Debug)]
pub struct DiscoveryLoop {
    room_name: String,
    interval: Duration,
    last_discovery_at: Option<Instant>,
}

impl DiscoveryLoop {
    #[must_use]
    pub fn new(room_name: impl Into<String>, interval: Duration) -> Self {
        Self {
            room_name: room_name.into(),
            interval,
            last_discovery_at: None,
        }
    }

    /// Issue a discovery query if the interval has elapsed.
    ///
    /// Returns `true` when a query was sent.
    pub fn tick(&mut self, now: Instant, directory: &dyn DirectoryClient) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_discovery_at = Some(now);
        debug!(
            target: "room.session.discovery",
            room_name = %self.room_name,
            "Starting room discovery"
        );
        directory.discover_rooms();
        metrics::record_discovery_query();
        true
    }

    /// Restart the interval without querying, so the next query waits a
    /// full interval from `now`.
    pub fn defer(&mut self, now: Instant) {
        self.last_discovery_at = Some(now);
    }

    /// First candidate whose name equals the configured room name.
    #[must_use]
    pub fn match_candidate<'a>(&self, rooms: &'a [RoomCandidate]) -> Option<&'a RoomCandidate> {
        rooms.iter().find(|room| room.name == self.room_name)
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_discovery_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::collaborators::{EventSink, NotificationSource, SubscriptionId, TimeoutBehaviour};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct QueryCounter {
        queries: AtomicU32,
    }

    impl NotificationSource for QueryCounter {
        fn subscribe(&self, _sink: EventSink) -> SubscriptionId {
            SubscriptionId(0)
        }
        fn unsubscribe(&self, _id: SubscriptionId) {}
    }

    impl DirectoryClient for QueryCounter {
        fn create_and_join(&self, _room_name: &str, _public: bool) {}
        fn discover_rooms(&self) {
            self.queries.fetch_add(1, Ordering::SeqCst);
        }
        fn join_by_code(&self, _join_code: &str) {}
        fn ping(&self) {}
        fn set_timeout_behaviour(&self, _behaviour: TimeoutBehaviour) {}
    }

    #[test]
    fn test_first_exact_match_wins() {
        let discovery = DiscoveryLoop::new("Target", Duration::from_secs(2));
        let rooms = vec![
            RoomCandidate::new("Other", "c1"),
            RoomCandidate::new("Target", "c2"),
            RoomCandidate::new("Target", "c3"),
        ];

        let matched = discovery.match_candidate(&rooms).unwrap();
        assert_eq!(matched.join_code, "c2");
    }

    #[test]
    fn test_match_is_exact() {
        let discovery = DiscoveryLoop::new("Lab", Duration::from_secs(2));
        let rooms = vec![
            RoomCandidate::new("lab", "x1"),
            RoomCandidate::new("Lab ", "x2"),
            RoomCandidate::new("Lab 2", "x3"),
        ];
        assert!(discovery.match_candidate(&rooms).is_none());
        assert!(discovery.match_candidate(&[]).is_none());
    }

    #[test]
    fn test_queries_gated_by_interval() {
        let directory = QueryCounter::default();
        let mut discovery = DiscoveryLoop::new("Lab", Duration::from_secs(2));
        let t0 = Instant::now();

        // First tick always queries
        assert!(discovery.tick(t0, &directory));
        // Within the interval nothing happens, including exactly at the boundary
        assert!(!discovery.tick(t0 + Duration::from_millis(500), &directory));
        assert!(!discovery.tick(t0 + Duration::from_secs(2), &directory));
        // Past the interval a new query goes out
        assert!(discovery.tick(t0 + Duration::from_millis(2001), &directory));

        assert_eq!(directory.queries.load(Ordering::SeqCst), 2);
        // The interval restarts from the last query
        assert!(!discovery.tick(t0 + Duration::from_millis(4001), &directory));
    }

    #[test]
    fn test_defer_restarts_interval() {
        let directory = QueryCounter::default();
        let mut discovery = DiscoveryLoop::new("Lab", Duration::from_secs(2));
        let t0 = Instant::now();

        discovery.tick(t0, &directory);
        discovery.defer(t0 + Duration::from_secs(3));

        assert!(!discovery.tick(t0 + Duration::from_secs(4), &directory));
        assert!(discovery.tick(t0 + Duration::from_millis(5001), &directory));
        assert_eq!(directory.queries.load(Ordering::SeqCst), 2);
    }
}
