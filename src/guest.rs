//! The guest-side counterpart to [`crate::system::ComponentSystem`] —
//! SPEC_FULL.md §4.H, §9 ("static proxy" resolution of the open question on
//! the JS source's dynamic component proxy).
//!
//! A `GuestClient` wraps a [`Peer`] already attached to the guest's
//! transport. It holds calls until `system-enabled` arrives from the host
//! (the enable handshake — SPEC_FULL.md §5) so a guest script can start
//! issuing calls immediately after construction without racing host-side
//! mounting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::RemoteError;
use crate::event::{Listener, ListenerId};
use crate::message::Params;
use crate::peer::Peer;

pub struct GuestClient {
    peer: Arc<Peer>,
    enabled_flag: AtomicBool,
    enabled_notify: Notify,
}

impl GuestClient {
    pub fn new(peer: Arc<Peer>) -> Arc<Self> {
        let client = Arc::new(Self {
            peer: peer.clone(),
            enabled_flag: AtomicBool::new(false),
            enabled_notify: Notify::new(),
        });

        let weak = Arc::downgrade(&client);
        peer.on(
            "system-enabled",
            Arc::new(move |_| {
                if let Some(client) = weak.upgrade() {
                    client.enabled_flag.store(true, Ordering::Release);
                    client.enabled_notify.notify_waiters();
                }
            }),
        );
        client
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled_flag.load(Ordering::Acquire)
    }

    /// Resolve once `system-enabled` has been observed. A call issued before
    /// that point still reaches the transport queue (the `Peer` itself
    /// queues FIFO until connected) but waiting here means a guest's
    /// component methods don't race host-side `component_did_mount`.
    pub async fn wait_until_enabled(&self) {
        // Register interest before checking the flag — otherwise a
        // `notify_waiters()` that lands between the check and the `notified()`
        // call wakes nobody, and this future hangs forever (tokio's own
        // `Notify` docs prescribe this ordering).
        let notified = self.enabled_notify.notified();
        if self.is_enabled() {
            return;
        }
        notified.await;
    }

    /// Ask the host to instantiate `names`, returning the subset it
    /// reports as loaded (a missing name is a `RemoteError`, not a partial
    /// success — see [`crate::system::ComponentSystem::handle_load_components`]).
    pub async fn load_components(&self, names: &[&str]) -> Result<Vec<String>, RemoteError> {
        let params = Params::Array(names.iter().map(|n| Value::String(n.to_string())).collect());
        let result = self.peer.call("LoadComponents", params).await?;
        match result {
            Value::Array(values) => Ok(values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            other => Ok(vec![other.to_string()]),
        }
    }

    pub async fn load_component(&self, name: &str) -> Result<(), RemoteError> {
        self.load_components(&[name]).await.map(|_| ())
    }

    /// Issue a call once the system is enabled. Used by `component_proxy!`
    /// generated methods rather than `peer().call` directly so every proxy
    /// method gets the same enable-handshake wait for free.
    pub async fn call(&self, method: &str, params: Params) -> Result<Value, RemoteError> {
        self.wait_until_enabled().await;
        self.peer.call(method, params).await
    }

    pub async fn notify(&self, event: &str, params: Params) {
        self.wait_until_enabled().await;
        self.peer.notify(event, params).await;
    }

    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.peer.on(event, listener)
    }

    /// Register the handler that tears down the guest runtime when the host
    /// sends `SIGKILL` (SPEC_FULL.md §4.I, §6). `SIGKILL` arrives as an
    /// ordinary inbound notification, so the dispatcher already emits it
    /// under that name — this just gives it a name a guest author expects.
    pub fn on_sigkill(&self, listener: Listener) -> ListenerId {
        self.peer.on("SIGKILL", listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn calls_wait_for_system_enabled_before_resolving() {
        let (a, b) = memory::pair();
        let host = Peer::new(a.transport.clone());
        let guest_peer = Peer::new(b.transport.clone());
        memory::spawn_pump(host.clone(), a.inbound);
        memory::spawn_pump(guest_peer.clone(), b.inbound);
        host.did_connect().await;
        guest_peer.did_connect().await;

        host.expose(
            "Echo.ping",
            Arc::new(|_| Box::pin(async move { Ok(Value::from("pong")) })),
        );

        let client = GuestClient::new(guest_peer.clone());
        let seen_before_enable = Arc::new(AtomicUsize::new(0));
        let s = seen_before_enable.clone();

        let call_fut = {
            let client = client.clone();
            tokio::spawn(async move {
                let result = client.call("Echo.ping", Params::Array(vec![])).await;
                s.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                result
            })
        };

        tokio::task::yield_now().await;
        assert_eq!(seen_before_enable.load(std::sync::atomic::Ordering::SeqCst), 0);

        host.enable().await;
        let result = call_fut.await.unwrap();
        assert_eq!(result.unwrap(), Value::from("pong"));
    }
}
