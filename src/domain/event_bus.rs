//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Services publish
//! a [`DirectoryEvent`] after each committed transition and the notification
//! dispatcher subscribes to turn them into emails and alerts.

use tokio::sync::broadcast;

use super::DirectoryEvent;

/// Broadcast bus for [`DirectoryEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers; notifications are best-effort so that is acceptable.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DirectoryEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: DirectoryEvent) -> usize {
        let kind = event.event_type_str();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event_type = kind, delivered, "domain event published");
        delivered
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
