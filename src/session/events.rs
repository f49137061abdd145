//! In-process session event bus.
//!
//! Subscribers are plain callbacks invoked synchronously, in subscription
//! order, once per [`SessionEventBus::publish`]. Async consumers can take a
//! channel instead via [`SessionEventBus::subscribe_channel`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Events published by the session client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// Renewal failed terminally; the user must sign in again.
    SessionEnded { reason: String },
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Publish point for [`SessionEvent`]s.
///
/// Cheap to clone; clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct SessionEventBus {
    inner: Arc<BusInner>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. It stays registered until
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .expect("lock poisoned")
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register a channel that receives a clone of every event.
    ///
    /// The subscription removes itself on the first publish after the
    /// receiver is dropped.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::downgrade(&self.inner);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler = Arc::new(move |event: &SessionEvent| {
            if tx.send(event.clone()).is_err() {
                if let Some(inner) = bus.upgrade() {
                    remove_subscriber(&inner, id);
                }
            }
        });
        self.inner
            .subscribers
            .write()
            .expect("lock poisoned")
            .push(Subscriber { id, handler });
        rx
    }

    /// Invoke every current subscriber once with `event`.
    ///
    /// The subscriber list is snapshotted first, so handlers may subscribe
    /// or unsubscribe without deadlocking.
    pub fn publish(&self, event: SessionEvent) {
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        debug!(subscribers = handlers.len(), ?event, "Publishing session event");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().expect("lock poisoned").len()
    }
}

impl std::fmt::Debug for SessionEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn remove_subscriber(inner: &BusInner, id: u64) {
    inner
        .subscribers
        .write()
        .expect("lock poisoned")
        .retain(|s| s.id != id);
}

/// Handle returned by [`SessionEventBus::subscribe`].
#[must_use = "dropping a Subscription keeps the handler registered; call unsubscribe() to remove it"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler from the bus.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            remove_subscriber(&inner, self.id);
        }
    }
}
