//! Name → factory table for components — SPEC_FULL.md §4.G.
//!
//! Mirrors the plugin manager's `registry: Mutex<HashMap<String, PluginInfo>>`
//! shape, generalized from on-disk manifests to in-process factories since
//! this crate has no dylib/wasm loading to do (see DESIGN.md).

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::component::{Component, ComponentFactory};
use crate::error::ComponentRegistryError;

/// A name → factory table, plus the `TypeId -> name` side-table that renders
/// the source's "hidden symbol tagging the class" without monkey-patching
/// anything (§9 "Class tagging"). Cheap to clone (`Arc`-backed internally via
/// `ComponentFactory`'s own `Arc`), so a `ComponentSystem` can hold its own
/// registry, or the process-wide [`GLOBAL`] one, without caring which.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: Mutex<HashMap<String, ComponentFactory>>,
    tags: Mutex<HashMap<TypeId, String>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory`, which builds instances of the concrete type `C`,
    /// under `name`.
    ///
    /// Two failure modes, mirroring the source's "name collision, class
    /// already tagged" pair (§3 "Component class registry", §4.G): a name
    /// already claimed by a different type is `NameTaken`, and a type already
    /// tagged with any name — including re-registering it under the same
    /// name again — is `AlreadyRegistered`. Unlike `Peer::expose`'s "last
    /// writer wins", component registration has no legitimate reason to let
    /// re-registration silently pass.
    pub fn register<C: Component + 'static>(
        &self,
        name: impl Into<String>,
        factory: ComponentFactory,
    ) -> Result<(), ComponentRegistryError> {
        let name = name.into();
        let type_id = TypeId::of::<C>();

        let mut tags = self.tags.lock();
        if tags.contains_key(&type_id) {
            return Err(ComponentRegistryError::AlreadyRegistered);
        }
        let mut factories = self.factories.lock();
        if factories.contains_key(&name) {
            return Err(ComponentRegistryError::NameTaken(name));
        }
        tags.insert(type_id, name.clone());
        factories.insert(name, factory);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<ComponentFactory, ComponentRegistryError> {
        self.factories
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentRegistryError::NotFound(name.to_string()))
    }

    /// Reverse lookup: the name a concrete component type `C` was tagged
    /// with at registration time, or `None` if it was never registered.
    pub fn name_of<C: Component + 'static>(&self) -> Option<String> {
        self.tags.lock().get(&TypeId::of::<C>()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.lock().keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.lock().contains_key(name)
    }
}

/// The process-wide registry, for binaries that want one global set of
/// components rather than constructing a fresh `ComponentRegistry` per
/// `ComponentSystem`. Entirely opt-in — `ComponentSystem::new` takes an
/// explicit `Arc<ComponentRegistry>` and nothing in this crate reaches for
/// `global()` on its own.
pub static GLOBAL: Lazy<Arc<ComponentRegistry>> = Lazy::new(|| Arc::new(ComponentRegistry::new()));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentOptions};

    struct Noop;
    impl Component for Noop {}

    struct OtherNoop;
    impl Component for OtherNoop {}

    fn factory() -> ComponentFactory {
        Arc::new(|_: ComponentOptions| Arc::new(Noop) as Arc<dyn Component>)
    }

    fn other_factory() -> ComponentFactory {
        Arc::new(|_: ComponentOptions| Arc::new(OtherNoop) as Arc<dyn Component>)
    }

    #[test]
    fn duplicate_name_with_a_different_type_is_rejected() {
        let registry = ComponentRegistry::new();
        registry.register::<Noop>("A", factory()).unwrap();
        let err = registry.register::<OtherNoop>("A", other_factory()).unwrap_err();
        assert_eq!(err, ComponentRegistryError::NameTaken("A".to_string()));
    }

    #[test]
    fn re_registering_an_already_tagged_type_is_rejected() {
        let registry = ComponentRegistry::new();
        registry.register::<Noop>("A", factory()).unwrap();
        let err = registry.register::<Noop>("A", factory()).unwrap_err();
        assert_eq!(err, ComponentRegistryError::AlreadyRegistered);
        // A fresh factory closure for the same concrete type is rejected
        // too — tagging is per-type, not per-closure-instance.
        let err = registry.register::<Noop>("B", factory()).unwrap_err();
        assert_eq!(err, ComponentRegistryError::AlreadyRegistered);
    }

    #[test]
    fn name_of_reverse_looks_up_a_registered_type() {
        let registry = ComponentRegistry::new();
        registry.register::<Noop>("A", factory()).unwrap();
        assert_eq!(registry.name_of::<Noop>(), Some("A".to_string()));
        assert_eq!(registry.name_of::<OtherNoop>(), None);
    }

    #[test]
    fn get_missing_component_errors() {
        let registry = ComponentRegistry::new();
        let err = registry.get("Missing").unwrap_err();
        assert_eq!(
            err,
            ComponentRegistryError::NotFound("Missing".to_string())
        );
    }
}
