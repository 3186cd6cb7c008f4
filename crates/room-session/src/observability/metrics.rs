//! Metrics definitions for the room session.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded by enums in this crate:
//! - `kind`: create, code
//! - `status`: joined, rejected, timeout
//! - `state`: the six session states
//! - `role`: host, client

use metrics::{counter, gauge};

/// Record a discovery query sent to the directory.
///
/// Metric: `room_discovery_queries_total`
/// Labels: none
pub fn record_discovery_query() {
    counter!("room_discovery_queries_total").increment(1);
}

/// Record a join attempt.
///
/// Metric: `room_join_attempts_total`
/// Labels: `kind` (create, code)
pub fn record_join_attempt(kind: &'static str) {
    counter!("room_join_attempts_total", "kind" => kind).increment(1);
}

/// Record the outcome of a join attempt.
///
/// Metric: `room_join_results_total`
/// Labels: `status` (joined, rejected, timeout)
pub fn record_join_result(status: &'static str) {
    counter!("room_join_results_total", "status" => status).increment(1);
}

/// Record a keepalive ping.
///
/// Metric: `room_pings_total`
/// Labels: none
pub fn record_ping() {
    counter!("room_pings_total").increment(1);
}

/// Record a disconnect detected through an unacknowledged ping.
///
/// Metric: `room_disconnects_total`
/// Labels: `role`
pub fn record_disconnect(role: &'static str) {
    counter!("room_disconnects_total", "role" => role).increment(1);
}

/// Record a session state transition.
///
/// Metric: `room_state_transitions_total`
/// Labels: `state` (target state)
pub fn record_state_transition(state: &'static str) {
    counter!("room_state_transitions_total", "state" => state).increment(1);
}

/// Set whether the session is currently joined to a room.
///
/// Metric: `room_session_joined`
/// Labels: none
pub fn set_session_joined(joined: bool) {
    gauge!("room_session_joined").set(if joined { 1.0 } else { 0.0 });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::DebuggingRecorder;

    #[test]
    fn test_all_metrics_recorded_with_room_prefix() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_discovery_query();
            record_join_attempt("create");
            record_join_attempt("code");
            record_join_result("joined");
            record_ping();
            record_disconnect("host");
            record_state_transition("joined");
            set_session_joined(true);
        });

        let names: Vec<String> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        for expected in [
            "room_discovery_queries_total",
            "room_join_attempts_total",
            "room_join_results_total",
            "room_pings_total",
            "room_disconnects_total",
            "room_state_transitions_total",
            "room_session_joined",
        ] {
            assert!(
                names.iter().any(|n| n == expected),
                "missing metric {expected}, got {names:?}"
            );
        }
        assert!(names.iter().all(|n| n.starts_with("room_")));
    }
}
