//! Typed publish/subscribe surface for sync lifecycle events.
//!
//! Every subscriber gets its own unbounded channel. Emitting never blocks the
//! sync task, and subscribers whose receiver was dropped are pruned on the
//! next emit.

use crate::{RecordCounts, SyncError, SyncMode};
use chrono::{DateTime, Utc};
use field_database::EntityKind;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    SyncStarted {
        mode: SyncMode,
        started_at: DateTime<Utc>,
    },
    SyncProgress {
        entity: EntityKind,
        current_page: u32,
        total_pages: u32,
        /// Records applied for `entity` so far in this session.
        processed_records: u64,
    },
    SyncFinished {
        duration: Duration,
        record_counts: RecordCounts,
        pages_processed: u32,
    },
    SyncFailed {
        reason: String,
        error: SyncError,
    },
}

/// Receiving end of a subscription. Ends when the hub drops all listeners.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<SyncEvent>,
}

impl EventSubscription {
    /// Wait for the next event; `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Stream for EventSubscription {
    type Item = SyncEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Fan-out hub for [`SyncEvent`]s.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Only events emitted after this call are delivered.
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        EventSubscription { receiver }
    }

    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Close every subscription.
    pub fn remove_all_listeners(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn listener_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn started() -> SyncEvent {
        SyncEvent::SyncStarted {
            mode: SyncMode::Manual,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.emit(started());
        assert!(matches!(a.recv().await, Some(SyncEvent::SyncStarted { .. })));
        assert!(matches!(b.next().await, Some(SyncEvent::SyncStarted { .. })));
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let hub = EventHub::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());

        hub.emit(started());
        assert_eq!(hub.listener_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_remove_all_listeners_closes_streams() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        hub.remove_all_listeners();

        assert_eq!(hub.listener_count(), 0);
        assert_eq!(sub.recv().await, None);
    }
}
