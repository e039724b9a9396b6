//! The symmetric RPC peer — both roles from SPEC_FULL.md §4.C and §4.D live
//! on one type, since the protocol is symmetric: either side can `call`,
//! `notify`, and `expose`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{trace, warn};

use crate::error::{CodecError, HandlerError, PeerClosed, RemoteError};
use crate::event::{EventDispatcher, Listener, ListenerId};
use crate::message::{decode, encode, Message, Outcome, Params, WireError};
use crate::transport::Transport;

/// A server-role method handler: unpacked params in, a JSON value or a
/// structured error out.
pub type MethodHandler =
    Arc<dyn Fn(Params) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

struct SendState {
    queue: VecDeque<String>,
    connected: bool,
}

/// One endpoint of the RPC protocol over one transport.
///
/// Always constructed behind an `Arc` — the dispatch loop, proxies, and
/// background pumps all need to share ownership of the same peer.
pub struct Peer {
    transport: Arc<dyn Transport>,
    send_state: AsyncMutex<SendState>,
    pending: SyncMutex<HashMap<u64, oneshot::Sender<Result<Value, RemoteError>>>>,
    next_id: AtomicU64,
    methods: SyncMutex<HashMap<String, MethodHandler>>,
    dispatcher: EventDispatcher,
    connected_flag: AtomicBool,
}

impl Peer {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            send_state: AsyncMutex::new(SendState {
                queue: VecDeque::new(),
                connected: false,
            }),
            pending: SyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            methods: SyncMutex::new(HashMap::new()),
            dispatcher: EventDispatcher::new(),
            connected_flag: AtomicBool::new(false),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected_flag.load(Ordering::Acquire)
    }

    // ─── Client role ───────────────────────────────────────────────────

    /// Issue a request and await its response. Allocates the next id,
    /// records the completion handle, then enqueues (or sends) the
    /// serialized request.
    pub async fn call(&self, method: &str, params: Params) -> Result<Value, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let message = encode(&Message::request(id, method, params));
        self.enqueue(message).await;

        match rx.await {
            Ok(result) => result,
            // The sender was dropped without resolving — happens only if
            // `unmount` clears pending entries without sending on them,
            // which it doesn't (it always sends `PeerClosed`); kept as a
            // defensive fallback rather than a silent hang.
            Err(_) => Err(PeerClosed.into()),
        }
    }

    /// Fire-and-forget notification. Same structured-params contract as
    /// `call`, no id, no completion handle.
    pub async fn notify(&self, method: &str, params: Params) {
        let message = encode(&Message::notification(method, params));
        self.enqueue(message).await;
    }

    // ─── Server role ───────────────────────────────────────────────────

    /// Register `handler` under `name`. Re-registration replaces the prior
    /// handler silently — "last writer wins" (SPEC_FULL.md §9, the resolved
    /// open question on `expose` re-registration semantics).
    pub fn expose(&self, name: impl Into<String>, handler: MethodHandler) {
        self.methods.lock().insert(name.into(), handler);
    }

    /// Unblock the peer's queued-before-connect guest calls. The exact
    /// notification name is part of the `ComponentSystem` contract
    /// (SPEC_FULL.md §4.H).
    pub async fn enable(&self) {
        self.notify("system-enabled", Params::Array(vec![])).await;
    }

    // ─── Event dispatcher passthrough ──────────────────────────────────

    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.dispatcher.on(event, listener)
    }

    pub fn once(&self, event: &str, listener: Listener) -> ListenerId {
        self.dispatcher.once(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) {
        self.dispatcher.off(event, id)
    }

    pub fn emit(&self, event: &str, params: Value) {
        self.dispatcher.emit(event, params)
    }

    // ─── Connection handshake ───────────────────────────────────────────

    /// Idempotent. Sets `connected = true` once and flushes the queue in
    /// FIFO order.
    pub async fn did_connect(&self) {
        let mut state = self.send_state.lock().await;
        if state.connected {
            return;
        }
        state.connected = true;
        self.connected_flag.store(true, Ordering::Release);
        self.drain_locked(&mut state).await;
    }

    async fn enqueue(&self, message: String) {
        let mut state = self.send_state.lock().await;
        state.queue.push_back(message);
        self.drain_locked(&mut state).await;
    }

    /// Send everything currently queued, in order, while connected. Holding
    /// `send_state`'s lock across the transport `.await` is what gives two
    /// concurrent callers (and a concurrent `did_connect`) total FIFO order.
    async fn drain_locked(&self, state: &mut SendState) {
        if !state.connected {
            return;
        }
        while let Some(message) = state.queue.pop_front() {
            if let Err(err) = self.transport.send(message).await {
                warn!(err = %err, "transport send failed — message dropped");
                break;
            }
        }
    }

    // ─── Inbound dispatch ───────────────────────────────────────────────

    /// Called by the owning transport with a received string.
    pub async fn process_message(self: &Arc<Self>, raw: &str) {
        let message = match decode(raw) {
            Ok(m) => m,
            Err(err) => {
                self.emit("error", Value::String(err.to_string()));
                return;
            }
        };

        match message {
            Message::Response { id, outcome } => self.handle_response(id, outcome),
            Message::Request { id, method, params } => {
                self.handle_request(id, method, params).await
            }
            Message::Notification { method, params } => {
                self.dispatcher.emit(&method, params.into_value());
            }
        }
    }

    fn handle_response(&self, id: u64, outcome: Outcome) {
        let sender = self.pending.lock().remove(&id);
        let Some(sender) = sender else {
            self.emit(
                "error",
                Value::String(format!("response for unknown id {id}")),
            );
            return;
        };
        let result = match outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(WireError {
                message,
                code,
                data,
                stack,
            }) => Err(RemoteError {
                message,
                code,
                data,
                stack,
            }),
        };
        // The receiver can only be gone if the caller's future was dropped
        // (cancelled) — nothing to report back to in that case.
        let _ = sender.send(result);
    }

    async fn handle_request(self: &Arc<Self>, id: u64, method: String, params: Params) {
        let handler = self.methods.lock().get(&method).cloned();
        let Some(handler) = handler else {
            let reply = Message::error(
                id,
                WireError {
                    message: format!("Method not found: {method}"),
                    code: Some(-32601),
                    data: None,
                    stack: None,
                },
            );
            self.enqueue(encode(&reply)).await;
            return;
        };

        trace!(method = %method, "dispatching request");
        let reply = match handler(params).await {
            Ok(value) => Message::result(id, value),
            Err(err) => Message::error(
                id,
                WireError {
                    message: err.message,
                    code: err.code,
                    data: err.data,
                    stack: err.stack,
                },
            ),
        };
        self.enqueue(encode(&reply)).await;
    }

    /// Reject every still-pending call with `PeerClosed`. Used by
    /// [`crate::system::ComponentSystem::unmount`] (SPEC_FULL.md §9,
    /// "Pending calls on teardown") — a bare `Peer` never calls this itself.
    pub fn reject_all_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for (_, sender) in pending {
            let _ = sender.send(Err(PeerClosed.into()));
        }
    }
}

/// Returned by `decode` failures that never reach `process_message` because
/// they happened while building a message to send, not while receiving one.
/// Kept alongside `Peer` because both directions share the same codec.
pub type EncodeError = CodecError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;

    fn value_params(values: Vec<Value>) -> Params {
        Params::Array(values)
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let (a, b) = memory::pair();
        let host = Peer::new(a.transport.clone());
        let guest = Peer::new(b.transport.clone());
        memory::spawn_pump(host.clone(), a.inbound);
        memory::spawn_pump(guest.clone(), b.inbound);
        host.did_connect().await;
        guest.did_connect().await;

        host.expose(
            "Echo",
            Arc::new(|params: Params| {
                Box::pin(async move { Ok(params.into_value()) })
            }),
        );

        let result = guest.call("Echo", value_params(vec![Value::from(42)])).await;
        assert_eq!(result.unwrap(), Value::from(vec![Value::from(42)]));
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (a, b) = memory::pair();
        let host = Peer::new(a.transport.clone());
        let guest = Peer::new(b.transport.clone());
        memory::spawn_pump(host.clone(), a.inbound);
        memory::spawn_pump(guest.clone(), b.inbound);
        host.did_connect().await;
        guest.did_connect().await;

        let err = guest
            .call("NotDeclared", value_params(vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.code, Some(-32601));
        assert!(err.message.contains("Method not found"));
    }

    #[tokio::test]
    async fn queued_calls_flush_in_order_after_connect() {
        let (a, b) = memory::pair();
        let sender = Peer::new(a.transport.clone());
        let receiver = Peer::new(b.transport.clone());
        memory::spawn_pump(sender.clone(), a.inbound);
        memory::spawn_pump(receiver.clone(), b.inbound);

        let seen: Arc<SyncMutex<Vec<String>>> = Arc::new(SyncMutex::new(Vec::new()));
        let s1 = seen.clone();
        receiver.expose(
            "A",
            Arc::new(move |_| {
                let s1 = s1.clone();
                Box::pin(async move {
                    s1.lock().push("A".to_string());
                    Ok(Value::Null)
                })
            }),
        );
        let s2 = seen.clone();
        receiver.on(
            "B",
            Arc::new(move |_| s2.lock().push("B".to_string())),
        );
        receiver.did_connect().await;

        // Issued before `sender` is connected — both should queue.
        let call_fut = sender.call("A", value_params(vec![]));
        sender.notify("B", value_params(vec![Value::from(1)])).await;

        sender.did_connect().await;
        call_fut.await.unwrap();

        // Give the B notification a moment to land (no response to await).
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*seen.lock(), vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn malformed_message_emits_error_and_does_not_break_later_dispatch() {
        let (a, b) = memory::pair();
        let host = Peer::new(a.transport.clone());
        let guest = Peer::new(b.transport.clone());
        memory::spawn_pump(host.clone(), a.inbound);
        memory::spawn_pump(guest.clone(), b.inbound);
        host.did_connect().await;
        guest.did_connect().await;

        let errors: Arc<SyncMutex<u32>> = Arc::new(SyncMutex::new(0));
        let e = errors.clone();
        guest.on("error", Arc::new(move |_| *e.lock() += 1));

        guest.process_message("{").await;
        assert_eq!(*errors.lock(), 1);

        host.expose(
            "Echo",
            Arc::new(|params: Params| Box::pin(async move { Ok(params.into_value()) })),
        );
        let result = guest.call("Echo", value_params(vec![Value::from(1)])).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn reject_all_pending_resolves_outstanding_calls_with_peer_closed() {
        let (a, _b) = memory::pair();
        let peer = Peer::new(a.transport.clone());
        peer.did_connect().await;

        let call_fut = peer.call("Never", value_params(vec![]));
        peer.reject_all_pending();
        let err = call_fut.await.unwrap_err();
        assert!(err.message.contains("closed"));
    }
}
