//! Subscriber bookkeeping shared by the mocks.

use room_session::collaborators::{EventSink, SessionEvent, SubscriptionId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mock's state, ignoring poisoning from a panicking test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub(crate) struct SinkRegistry {
    next_id: AtomicU64,
    sinks: Mutex<BTreeMap<u64, EventSink>>,
}

impl SinkRegistry {
    pub(crate) fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.sinks).insert(id, sink);
        SubscriptionId(id)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.sinks).remove(&id.0);
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.sinks).len()
    }

    /// Deliver an event produced by `make` to every subscriber.
    ///
    /// Returns how many subscribers accepted it.
    pub(crate) fn emit(&self, make: impl Fn() -> SessionEvent) -> usize {
        // Clone out of the lock so a sink never runs while we hold it
        let sinks: Vec<EventSink> = lock(&self.sinks).values().cloned().collect();
        sinks.iter().filter(|sink| sink.emit(make())).count()
    }
}
