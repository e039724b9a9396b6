//! The host-side component runtime — SPEC_FULL.md §4.H.
//!
//! A `ComponentSystem` pairs a [`Peer`] with a [`ComponentRegistry`],
//! lazily instantiating components on first use, mounting them in
//! insertion order on `enable`, and tearing them down in reverse on
//! `unmount`. Modeled on the plugin manager's `plugins: Mutex<HashMap<...>>`
//! instance table, generalized to preserve insertion order (a plain
//! `HashMap` can't) since mount order is an observable guarantee here.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tracing::{info, warn};

use crate::component::{Component, ComponentOptions};
use crate::error::{ComponentSystemError, HandlerError};
use crate::message::Params;
use crate::peer::Peer;
use crate::registry::ComponentRegistry;

/// The long-lived out-of-process thing a `ComponentSystem` owns — a worker
/// thread, a child process, a WASM instance. `SIGKILL` terminates it before
/// the system tears down its components. Optional: a `ComponentSystem` with
/// no worker (e.g. driving an in-process guest in tests) just skips this.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn terminate(&self);
}

struct Instances {
    by_name: IndexMap<String, Arc<dyn Component>>,
    closed: bool,
}

/// Owns one guest connection's component instances. One `ComponentSystem`
/// per connected guest — it is not a process-wide singleton (that's what
/// [`ComponentRegistry`] is for).
pub struct ComponentSystem {
    peer: Arc<Peer>,
    registry: Arc<ComponentRegistry>,
    instances: SyncMutex<Instances>,
    worker: Option<Arc<dyn Worker>>,
}

impl ComponentSystem {
    pub fn new(peer: Arc<Peer>, registry: Arc<ComponentRegistry>) -> Arc<Self> {
        Self::with_worker(peer, registry, None)
    }

    pub fn with_worker(
        peer: Arc<Peer>,
        registry: Arc<ComponentRegistry>,
        worker: Option<Arc<dyn Worker>>,
    ) -> Arc<Self> {
        let system = Arc::new(Self {
            peer,
            registry,
            instances: SyncMutex::new(Instances {
                by_name: IndexMap::new(),
                closed: false,
            }),
            worker,
        });
        system.install_reserved_methods();
        system
    }

    /// Expose `LoadComponents` on the peer — the one reserved inbound
    /// method name (SPEC_FULL.md §4.H). `SIGKILL` is the other reserved
    /// name, but it flows host→guest as a notification (§6), not inbound to
    /// the host, so `unmount` sends it rather than exposing a handler here.
    fn install_reserved_methods(self: &Arc<Self>) {
        let this = self.clone();
        self.peer.expose(
            "LoadComponents",
            Arc::new(move |params: Params| {
                let this = this.clone();
                Box::pin(async move { this.handle_load_components(params).await })
                    as BoxFuture<'static, Result<Value, HandlerError>>
            }),
        );
    }

    async fn handle_load_components(&self, params: Params) -> Result<Value, HandlerError> {
        let names: Vec<String> = match params.into_value() {
            Value::Array(values) => values
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(HandlerError::new(format!(
                        "LoadComponents expects an array of component names, got {other}"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(HandlerError::new(format!(
                    "LoadComponents expects an array of component names, got {other}"
                )))
            }
        };

        let mut missing = Vec::new();
        let mut loaded = Vec::new();
        for name in names {
            match self.get_component_instance(&name) {
                Ok(_) => loaded.push(name),
                Err(_) => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(HandlerError::new(
                ComponentSystemError::MissingComponents(missing).to_string(),
            ));
        }
        Ok(Value::Array(loaded.into_iter().map(Value::String).collect()))
    }

    /// Instantiate `name` on first use (via its registered factory) and
    /// return the shared instance on every subsequent call. Mounting
    /// (`component_did_mount`) happens later, in `enable`, not here — a
    /// component can be constructed before the system is enabled, e.g. to
    /// validate a `LoadComponents` request eagerly.
    pub fn get_component_instance(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Component>, ComponentSystemError> {
        let mut instances = self.instances.lock();
        if instances.closed {
            return Err(ComponentSystemError::Closed);
        }
        if let Some(existing) = instances.by_name.get(name) {
            return Ok(existing.clone());
        }
        let factory = self.registry.get(name)?;
        let options = ComponentOptions::new(self.peer.clone(), name);
        let instance = factory(options);
        instances.by_name.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Mount every instantiated component in insertion order, then unblock
    /// the peer's queued calls by sending `system-enabled`
    /// (SPEC_FULL.md §5, "enable handshake").
    pub async fn enable(self: &Arc<Self>) {
        self.peer.emit("system-will-enable", Value::Null);

        let snapshot: Vec<(String, Arc<dyn Component>)> = {
            let instances = self.instances.lock();
            instances
                .by_name
                .iter()
                .map(|(name, instance)| (name.clone(), instance.clone()))
                .collect()
        };
        for (name, instance) in snapshot {
            if let Err(err) = instance.component_did_mount().await {
                warn!(component = %name, err = %err, "component_did_mount failed");
            }
        }

        self.peer.enable().await;
    }

    /// Send `SIGKILL` to the guest, tear down every mounted component in
    /// reverse insertion order, terminate the owned worker (if any), and
    /// reject every call still waiting on a response (SPEC_FULL.md §9, the
    /// resolved open question: unmount rejects pending calls with
    /// `PeerClosed` rather than hanging them forever). Order matches S6:
    /// `SIGKILL` sent → `systemWillUnmount` → per-component unmount →
    /// worker terminated → `systemDidUnmount`.
    pub async fn unmount(self: &Arc<Self>) {
        let snapshot: Vec<(String, Arc<dyn Component>)> = {
            let mut instances = self.instances.lock();
            if instances.closed {
                return;
            }
            instances.closed = true;
            instances
                .by_name
                .iter()
                .rev()
                .map(|(name, instance)| (name.clone(), instance.clone()))
                .collect()
        };

        self.peer.notify("SIGKILL", Params::None).await;
        self.peer.emit("system-will-unmount", Value::Null);

        for (name, instance) in snapshot {
            if let Err(err) = instance.component_will_unmount().await {
                warn!(component = %name, err = %err, "component_will_unmount failed");
            }
        }

        if let Some(worker) = &self.worker {
            worker.terminate().await;
        }

        self.peer.reject_all_pending();
        info!("component system unmounted");
        self.peer.emit("system-did-unmount", Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use async_trait::async_trait as _async_trait;

    struct Counter {
        mounted: Arc<std::sync::atomic::AtomicUsize>,
        unmounted: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[_async_trait]
    impl Component for Counter {
        async fn component_did_mount(&self) -> Result<(), HandlerError> {
            self.mounted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
        async fn component_will_unmount(&self) -> Result<(), HandlerError> {
            self.unmounted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_factory(
        mounted: Arc<std::sync::atomic::AtomicUsize>,
        unmounted: Arc<std::sync::atomic::AtomicUsize>,
    ) -> crate::component::ComponentFactory {
        Arc::new(move |_opts: ComponentOptions| {
            Arc::new(Counter {
                mounted: mounted.clone(),
                unmounted: unmounted.clone(),
            }) as Arc<dyn Component>
        })
    }

    #[tokio::test]
    async fn load_components_instantiates_and_enable_mounts_in_order() {
        let (a, _b) = memory::pair();
        let peer = Peer::new(a.transport.clone());
        peer.did_connect().await;

        let mounted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let unmounted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let registry = Arc::new(ComponentRegistry::new());
        registry
            .register::<Counter>("Counter", counting_factory(mounted.clone(), unmounted.clone()))
            .unwrap();

        let system = ComponentSystem::new(peer.clone(), registry);
        system.get_component_instance("Counter").unwrap();
        system.enable().await;
        assert_eq!(mounted.load(std::sync::atomic::Ordering::SeqCst), 1);

        system.unmount().await;
        assert_eq!(unmounted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn load_components_reports_missing_names() {
        let (a, _b) = memory::pair();
        let peer = Peer::new(a.transport.clone());
        peer.did_connect().await;
        let registry = Arc::new(ComponentRegistry::new());
        let system = ComponentSystem::new(peer.clone(), registry);

        let err = system
            .handle_load_components(Params::Array(vec![Value::String("Missing".into())]))
            .await
            .unwrap_err();
        assert!(err.message.contains("Missing"));
    }

    #[tokio::test]
    async fn unmount_rejects_pending_calls() {
        let (a, _b) = memory::pair();
        let peer = Peer::new(a.transport.clone());
        peer.did_connect().await;
        let registry = Arc::new(ComponentRegistry::new());
        let system = ComponentSystem::new(peer.clone(), registry);

        let call_fut = peer.call("Anything.method", Params::Array(vec![]));
        system.unmount().await;
        let err = call_fut.await.unwrap_err();
        assert!(err.message.contains("closed"));
    }
}
