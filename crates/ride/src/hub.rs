//! Fan-out of ride events to live observers.
//!
//! Each observer gets its own bounded channel. Events are serialized once and
//! offered without waiting; an observer whose buffer is full, or whose
//! receiver has gone away, is unregistered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::events::RideEvent;
use crate::provider::Broadcaster;

pub struct Hub {
    observers: DashMap<u64, mpsc::Sender<Arc<str>>>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Receiving end handed to an observer.
pub struct Subscription {
    pub id: u64,
    receiver: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    /// Next serialized frame, or `None` once the hub has dropped this observer.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }
}

impl Hub {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self { observers: DashMap::new(), next_id: AtomicU64::new(1), buffer: buffer.max(1) }
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.insert(id, sender);
        debug!(observer = id, observers = self.observers.len(), "observer registered");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.observers.remove(&id).is_some() {
            debug!(observer = id, "observer unregistered");
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Broadcaster for Hub {
    fn broadcast(&self, event: &RideEvent, sent_at: DateTime<Utc>) {
        let frame: Arc<str> = match event.to_frame(sent_at) {
            Ok(frame) => frame.into(),
            Err(err) => {
                error!(kind = event.kind(), error = %err, "failed to serialize event");
                return;
            }
        };

        // collect first: removing while iterating would deadlock the shard
        let mut dropped = Vec::new();
        for entry in &self.observers {
            match entry.value().try_send(Arc::clone(&frame)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        monotonic_counter.observers_dropped = 1,
                        observer = *entry.key(),
                        "observer buffer full; dropping observer"
                    );
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }
        for id in dropped {
            self.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::Hub;
    use crate::events::RideEvent;
    use crate::models::Position;
    use crate::provider::Broadcaster;

    fn event() -> RideEvent {
        RideEvent::current_location(&Position::new(1.0, 2.0, at()))
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn delivers_frames_to_every_observer() {
        let hub = Hub::new(4);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let sent_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 30).unwrap();
        hub.broadcast(&event(), sent_at);

        for sub in [&mut first, &mut second] {
            let frame = sub.recv().await.unwrap();
            assert!(frame.contains(r#""type":"current_location""#), "{frame}");
            assert!(frame.ends_with(r#""timestamp":"2025-01-01T00:00:30Z"}"#), "{frame}");
        }
    }

    #[tokio::test]
    async fn slow_observer_is_dropped() {
        let hub = Hub::new(1);
        let mut slow = hub.subscribe();
        let _fast = hub.subscribe();

        hub.broadcast(&event(), at());
        assert_eq!(hub.observer_count(), 2);

        // second frame overflows both single-slot buffers
        hub.broadcast(&event(), at());
        assert_eq!(hub.observer_count(), 0);

        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_observer_is_dropped() {
        let hub = Hub::new(4);
        let sub = hub.subscribe();
        let _kept = hub.subscribe();
        drop(sub);

        hub.broadcast(&event(), at());
        assert_eq!(hub.observer_count(), 1);
    }
}
