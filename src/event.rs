//! Named-event multicast with subscribe/once/off and per-listener error
//! isolation — SPEC_FULL.md §4.A.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// Handle returned by `on`/`once`, usable with `off` to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

/// A synchronous, in-process event bus. Shared by [`crate::peer::Peer`] for
/// both its public `on`/`emit` surface and its internal `"error"` channel.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Mutex<std::collections::HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, event: &str, once: bool, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.register(event, false, listener)
    }

    pub fn once(&self, event: &str, listener: Listener) -> ListenerId {
        self.register(event, true, listener)
    }

    /// No-op if `id` isn't registered under `event` (or anywhere).
    pub fn off(&self, event: &str, id: ListenerId) {
        if let Some(entries) = self.listeners.lock().get_mut(event) {
            entries.retain(|e| e.id != id);
        }
    }

    /// Deliver `params` to every listener on `event`, in registration order.
    ///
    /// A listener that panics is caught (mirroring the host daemon's
    /// file-watcher callback isolation, see DESIGN.md) and reported through
    /// the `"error"` event instead of unwinding past the dispatcher. Emitting
    /// `"error"` with no listeners, or a panicking `"error"` listener, is a
    /// no-op rather than a second panic.
    pub fn emit(&self, event: &str, params: Value) {
        let snapshot = self.snapshot(event);
        self.run(event, &snapshot, params);
    }

    fn snapshot(&self, event: &str) -> Vec<Entry> {
        let mut guard = self.listeners.lock();
        let Some(entries) = guard.get_mut(event) else {
            return Vec::new();
        };
        let snapshot = entries.clone();
        entries.retain(|e| !e.once);
        snapshot
    }

    fn run(&self, event: &str, entries: &[Entry], params: Value) {
        for entry in entries {
            let result =
                std::panic::catch_unwind(AssertUnwindSafe(|| (entry.listener)(params.clone())));
            if let Err(payload) = result {
                if event == "error" {
                    // Never re-enter: a broken "error" listener is swallowed.
                    continue;
                }
                let message = panic_message(&payload);
                self.emit(
                    "error",
                    Value::String(format!("listener for '{event}' panicked: {message}")),
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_fire_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        dispatcher.on("tick", Arc::new(move |_| o1.lock().push(1)));
        dispatcher.on("tick", Arc::new(move |_| o2.lock().push(2)));
        dispatcher.emit("tick", Value::Null);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        dispatcher.once(
            "tick",
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        dispatcher.emit("tick", Value::Null);
        dispatcher.emit("tick", Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_with_unregistered_id_is_a_no_op() {
        let dispatcher = EventDispatcher::new();
        dispatcher.off("tick", ListenerId(999));
    }

    #[test]
    fn panicking_listener_does_not_stop_later_listeners() {
        let dispatcher = EventDispatcher::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        dispatcher.on("tick", Arc::new(|_| panic!("boom")));
        dispatcher.on(
            "tick",
            Arc::new(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            }),
        );
        dispatcher.emit("tick", Value::Null);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_error_with_no_listeners_does_not_panic() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit("error", Value::String("whoops".into()));
    }

    #[test]
    fn panicking_listener_reports_via_error_event() {
        let dispatcher = EventDispatcher::new();
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let m = messages.clone();
        dispatcher.on(
            "error",
            Arc::new(move |v| m.lock().push(v.as_str().unwrap_or_default().to_string())),
        );
        dispatcher.on("tick", Arc::new(|_| panic!("boom")));
        dispatcher.emit("tick", Value::Null);
        assert_eq!(messages.lock().len(), 1);
        assert!(messages.lock()[0].contains("boom"));
    }
}
