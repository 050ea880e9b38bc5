//! Tag-keyed component registries.
//!
//! The switch and each context carry a registry of target-supplied
//! components (packet replication engines, learning bridges, pre/post
//! processors). Components register under a tag the component kind declares
//! and are retrieved as typed handles; registration is first-wins, and all
//! of it happens at switch-build time, before the data plane runs.

use std::any::Any;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

/// A registry mapping string tags to shared, type-erased components.
#[derive(Default)]
pub struct ComponentRegistry {
    map: RwLock<FxHashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("tags", &self.map.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under a tag. First registration wins; a
    /// duplicate tag returns `false` and leaves the original in place.
    pub fn register<T: Send + Sync + 'static>(&self, tag: &str, component: Arc<T>) -> bool {
        let mut map = self.map.write();
        if map.contains_key(tag) {
            return false;
        }
        map.insert(tag.to_string(), component);
        true
    }

    /// Retrieves the component registered under a tag, typed. `None` when
    /// the tag is unknown or holds a different type.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, tag: &str) -> Option<Arc<T>> {
        let map = self.map.read();
        map.get(tag).cloned()?.downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReplicationEngine {
        groups: usize,
    }

    #[test]
    fn register_and_retrieve_typed() {
        let registry = ComponentRegistry::new();
        assert!(registry.register("pre", Arc::new(ReplicationEngine { groups: 4 })));
        let engine: Arc<ReplicationEngine> = registry.get("pre").unwrap();
        assert_eq!(engine.groups, 4);
    }

    #[test]
    fn first_registration_wins() {
        let registry = ComponentRegistry::new();
        assert!(registry.register("pre", Arc::new(ReplicationEngine { groups: 4 })));
        assert!(!registry.register("pre", Arc::new(ReplicationEngine { groups: 9 })));
        let engine: Arc<ReplicationEngine> = registry.get("pre").unwrap();
        assert_eq!(engine.groups, 4);
    }

    #[test]
    fn wrong_type_yields_none() {
        let registry = ComponentRegistry::new();
        registry.register("pre", Arc::new(ReplicationEngine { groups: 4 }));
        assert!(registry.get::<String>("pre").is_none());
        assert!(registry.get::<ReplicationEngine>("unknown").is_none());
    }
}
