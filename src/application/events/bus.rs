//! Event bus built on tokio broadcast channels.
//!
//! Publishers never block: if nobody listens the message is dropped.
//! Slow subscribers may lag and skip messages rather than stall the
//! ride path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{Event, EventMessage};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for service events
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: Event) {
        let subscribers = self.subscriber_count.load(Ordering::Relaxed);
        let message = EventMessage::new(event);

        debug!(
            event_type = message.event.event_type(),
            subscribers, "publishing event"
        );

        // send() errs only when there are zero receivers, which is fine
        let _ = self.sender.send(message);
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> EventSubscriber {
        self.subscriber_count.fetch_add(1, Ordering::Relaxed);
        EventSubscriber {
            receiver: self.sender.subscribe(),
            subscriber_count: Arc::clone(&self.subscriber_count),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Receiving side of the bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    /// Receive the next event, skipping over any lagged gap.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "event subscriber lagged behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::Relaxed);
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::default())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::types::{DeviceConnectedEvent, LowBatteryEvent};
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        bus.publish(Event::LowBattery(LowBatteryEvent {
            vehicle_id: "VH-9".into(),
            percentage: 15,
            timestamp: Utc::now(),
        }));

        let message = sub.recv().await.unwrap();
        assert_eq!(message.event.event_type(), "low_battery");
        assert!(!message.id.is_empty());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(Event::DeviceConnected(DeviceConnectedEvent {
            device_id: "VH-1".into(),
            remote_addr: None,
            timestamp: Utc::now(),
        }));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_subscriber_decrements_count() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
