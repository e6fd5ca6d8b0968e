//! Publish/subscribe bus for engine lifecycle events
//!
//! The bus is an ordinary value: construct it once, keep it in an `Arc` on a
//! long-lived component, and hand it to every executor that should report to
//! the same observers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use shardex_errors::EventError;
use tracing::warn;

use crate::EventMessage;

/// Observer of engine events.
///
/// Listeners run synchronously on the publishing worker, so they should hand
/// heavy work off (see [`crate::ChannelListener`]).
pub trait EventListener: Send + Sync {
    /// Name used when reporting listener failures.
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Handle one published event.
    ///
    /// # Errors
    ///
    /// A returned error is logged by the bus and otherwise ignored.
    fn on_event(&self, message: &EventMessage) -> Result<(), EventError>;
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    listener: Arc<dyn EventListener>,
}

/// Copy-on-write listener registry with synchronous fan-out.
pub struct EventBus {
    subscriptions: RwLock<Arc<Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener; it receives every event published afterwards.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Subscription> = guard
            .iter()
            .map(|s| Subscription {
                id: s.id,
                listener: Arc::clone(&s.listener),
            })
            .collect();
        next.push(Subscription { id, listener });
        *guard = Arc::new(next);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|s| s.id == id) {
            return false;
        }
        let next: Vec<Subscription> = guard
            .iter()
            .filter(|s| s.id != id)
            .map(|s| Subscription {
                id: s.id,
                listener: Arc::clone(&s.listener),
            })
            .collect();
        *guard = Arc::new(next);
        true
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Deliver a message to every current listener in registration order.
    ///
    /// Listener errors and panics are logged and never reach the publisher
    /// or the remaining listeners.
    pub fn publish(&self, message: &EventMessage) {
        let snapshot = self.snapshot();
        for subscription in snapshot.iter() {
            let listener = &subscription.listener;
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(message))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        listener = listener.name(),
                        event_id = %message.meta.event_id,
                        error = %err,
                        "event listener failed"
                    );
                }
                Err(payload) => {
                    warn!(
                        listener = listener.name(),
                        event_id = %message.meta.event_id,
                        panic = %panic_message(payload.as_ref()),
                        "event listener panicked"
                    );
                }
            }
        }
    }

    fn snapshot(&self) -> Arc<Vec<Subscription>> {
        Arc::clone(
            &self
                .subscriptions
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Best-effort rendering of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineEvent, OperationEvent};
    use shardex_types::SqlType;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EventListener for Recorder {
        fn on_event(&self, _message: &EventMessage) -> Result<(), EventError> {
            self.log.lock().unwrap().push(self.tag);
            Ok(())
        }
    }

    struct Failing;

    impl EventListener for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_event(&self, _message: &EventMessage) -> Result<(), EventError> {
            Err(EventError::listener_failed("failing", "always fails"))
        }
    }

    struct Panicking;

    impl EventListener for Panicking {
        fn on_event(&self, _message: &EventMessage) -> Result<(), EventError> {
            panic!("listener bug");
        }
    }

    fn message() -> EventMessage {
        EventMessage::from_event(EngineEvent::Operation(OperationEvent::Started {
            operation_id: Uuid::new_v4(),
            sql_type: SqlType::Dql,
            units: 1,
            strict: true,
        }))
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(recorder("a", &log));
        bus.subscribe(recorder("b", &log));

        bus.publish(&message());

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn failing_and_panicking_listeners_are_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Failing));
        bus.subscribe(Arc::new(Panicking));
        bus.subscribe(recorder("after", &log));

        bus.publish(&message());
        bus.publish(&message());

        assert_eq!(*log.lock().unwrap(), vec!["after", "after"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe(recorder("a", &log));

        bus.publish(&message());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&message());

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
