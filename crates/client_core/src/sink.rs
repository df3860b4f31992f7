use std::sync::{Arc, Mutex, PoisonError};

use shared::protocol::LifecycleEvent;
use tokio::sync::broadcast;

/// Ordered, append-only destination for lifecycle events. Publishing never fails
/// from the publisher's point of view and must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Fans events out to any number of `broadcast` subscribers.
pub struct BroadcastEventSink {
    events: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastEventSink {
    /// `capacity` is clamped to at least one buffered event.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: LifecycleEvent) {
        // No subscribers is fine; the event is simply dropped.
        let _ = self.events.send(event);
    }
}

/// In-memory log of every published event.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EventLog {
    pub fn snapshot(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Publishes each event to every inner sink, in registration order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: LifecycleEvent) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        for sink in rest {
            sink.publish(event.clone());
        }
        last.publish(event);
    }
}
