use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{AuctionEvent, EventKind, EventSink};

/// A thread-safe callback receiving a reference to a published event.
pub type EventHandler = Arc<dyn Fn(&AuctionEvent) + Send + Sync + 'static>;

/// In-process event bus.
///
/// Handlers are untrusted: each run is wrapped in `catch_unwind` so one bad
/// subscriber cannot prevent the rest from seeing the event. The transport
/// layer subscribes here to fan events out to connected clients.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
    on_handler_panic: Option<Arc<dyn Fn(EventKind) + Send + Sync + 'static>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a callback invoked whenever a handler panics.
    pub fn with_panic_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(EventKind) + Send + Sync + 'static,
    {
        self.on_handler_panic = Some(Arc::new(f));
        self
    }

    /// Register a handler for one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Register a handler for every event kind.
    pub fn subscribe_all(&self, handler: EventHandler) {
        for kind in [
            EventKind::LotStarted,
            EventKind::Bid,
            EventKind::Outbid,
            EventKind::NominatorChanged,
            EventKind::DraftCompleted,
        ] {
            self.subscribe(kind, Arc::clone(&handler));
        }
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: AuctionEvent) {
        let kind = event.kind();

        let handlers = {
            let map = self.handlers.read();
            match map.get(&kind) {
                Some(hs) => hs.clone(),
                None => return,
            }
        };

        for handler in handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(&event);
            }));

            if result.is_err() {
                tracing::error!(kind = ?kind, "event handler panicked");
                if let Some(ref hook) = self.on_handler_panic {
                    hook(kind);
                }
            }
        }
    }
}
