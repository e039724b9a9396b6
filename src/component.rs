//! The `Component` lifecycle trait and the scoped options a factory uses to
//! register its RPC surface without colliding with any other component's
//! names — SPEC_FULL.md §4.H.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::event::{Listener, ListenerId};
use crate::message::Params;
use crate::peer::{MethodHandler, Peer};

/// A host-exposed capability, instantiated at most once per
/// [`crate::system::ComponentSystem`].
#[async_trait]
pub trait Component: Send + Sync {
    /// Called once, when the owning system is `enable`d. Errors are logged
    /// and swallowed (SPEC_FULL.md §7, lifecycle errors never propagate).
    async fn component_did_mount(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called once, when the owning system tears down.
    async fn component_will_unmount(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// A factory builds a component instance from its scoped options. Stored in
/// the registry under the component's name.
pub type ComponentFactory = Arc<dyn Fn(ComponentOptions) -> Arc<dyn Component> + Send + Sync>;

/// The `on` / `notify` / `expose` primitives a component factory sees,
/// pre-prefixed with `"<component_name>."` so components can't collide in
/// the peer's flat method/event namespace.
#[derive(Clone)]
pub struct ComponentOptions {
    peer: Arc<Peer>,
    prefix: String,
}

impl ComponentOptions {
    pub(crate) fn new(peer: Arc<Peer>, component_name: &str) -> Self {
        Self {
            peer,
            prefix: format!("{component_name}."),
        }
    }

    /// Expose `"<prefix><method>"` as an RPC method on the peer.
    pub fn expose(&self, method: &str, handler: MethodHandler) {
        self.peer.expose(format!("{}{method}", self.prefix), handler);
    }

    /// Send `"<prefix><event>"` as an outgoing notification.
    pub async fn notify(&self, event: &str, params: Params) {
        self.peer.notify(&format!("{}{event}", self.prefix), params).await;
    }

    /// Subscribe to `"<prefix><event>"` on the peer's local event bus (fed
    /// by inbound notifications under that name).
    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.peer.on(&format!("{}{event}", self.prefix), listener)
    }

    /// Emit `"<prefix><event>"` locally only (no wire traffic) — used by a
    /// component to notify its own in-process listeners.
    pub fn emit_local(&self, event: &str, value: Value) {
        self.peer.emit(&format!("{}{event}", self.prefix), value);
    }
}
