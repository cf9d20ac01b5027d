//! Interning registry of metric definitions.
//!
//! A definition is identified by its id together with the source it is bound
//! to. Resolving the same pair twice yields the same `Arc`, so callers can
//! compare definitions with [`Arc::ptr_eq`] and share them between threads.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::address::Address;
use crate::definition::{self, MetricDefinition};
use crate::error::{ConfigurationError, MetricError};

type Key = (String, Address);

#[derive(Default)]
struct Inner {
    definitions: HashMap<Key, Arc<dyn MetricDefinition>>,
    // ids per source, in the order they were first interned
    by_source: HashMap<Address, Vec<String>>,
}

impl Inner {
    fn insert(&mut self, definition: Arc<dyn MetricDefinition>) -> Arc<dyn MetricDefinition> {
        let key = (definition.id().to_string(), definition.source().clone());
        if let Some(existing) = self.definitions.get(&key) {
            return Arc::clone(existing);
        }
        self.by_source
            .entry(key.1.clone())
            .or_default()
            .push(key.0.clone());
        self.definitions.insert(key, Arc::clone(&definition));
        definition
    }
}

/// Maps `(id, source)` to a single shared definition instance.
///
/// Lookups take a read lock; only the first resolution of a pair writes.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `id` for the local host.
    pub fn parse(&self, id: &str) -> Result<Arc<dyn MetricDefinition>, MetricError> {
        self.parse_for(id, &Address::Local)
    }

    /// Resolves `id` for `source`, constructing and interning it on first use.
    pub fn parse_for(
        &self,
        id: &str,
        source: &Address,
    ) -> Result<Arc<dyn MetricDefinition>, MetricError> {
        let key = (id.to_string(), source.clone());
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = inner.definitions.get(&key) {
                return Ok(Arc::clone(found));
            }
        }

        let built = definition::construct(id, source)
            .ok_or_else(|| ConfigurationError::UnknownMetric(id.to_string()))?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have interned the pair between the two locks.
        let interned = inner.insert(built);
        debug!(metric = id, source = %source, "interned metric definition");
        Ok(interned)
    }

    /// Interns an externally built definition.
    ///
    /// Returns the instance already registered for the same id and source, if
    /// any, so the interning guarantee holds for custom definitions too.
    pub fn register(&self, definition: Arc<dyn MetricDefinition>) -> Arc<dyn MetricDefinition> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition)
    }

    /// Every definition interned for `source`, in first-resolution order.
    pub fn definitions_for(&self, source: &Address) -> Vec<Arc<dyn MetricDefinition>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let Some(ids) = inner.by_source.get(source) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| inner.definitions.get(&(id.clone(), source.clone())))
            .cloned()
            .collect()
    }

    /// Ids of every metric the registry can construct.
    pub fn known_ids(&self) -> Vec<&'static str> {
        definition::builtin_ids()
    }

    /// Number of interned definitions across all sources.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-wide registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Resolves `id` for the local host through the global registry.
pub fn parse(id: &str) -> Result<Arc<dyn MetricDefinition>, MetricError> {
    GLOBAL.parse(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning() {
        let registry = Registry::new();
        let a = registry.parse("CpuIdleTime").unwrap();
        let b = registry.parse("CpuIdleTime").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(a.source(), &Address::Local);
    }

    #[test]
    fn test_same_id_different_sources_are_distinct() {
        let registry = Registry::new();
        let remote: Address = "ssh://ops@db1".parse().unwrap();
        let local = registry.parse("SwapFree").unwrap();
        let on_remote = registry.parse_for("SwapFree", &remote).unwrap();
        assert!(!Arc::ptr_eq(&local, &on_remote));
        assert_eq!(on_remote.source(), &remote);

        let again = registry
            .parse_for("SwapFree", &"ssh://ops@db1:22".parse().unwrap())
            .unwrap();
        assert!(Arc::ptr_eq(&on_remote, &again));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_metric() {
        let registry = Registry::new();
        let err = registry.parse("NoSuchMetric").unwrap_err();
        assert!(matches!(
            err,
            MetricError::Configuration(ConfigurationError::UnknownMetric(ref id)) if id == "NoSuchMetric"
        ));
        // ids are case-sensitive
        assert!(registry.parse("cpuidletime").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_definitions_for_source() {
        let registry = Registry::new();
        let remote: Address = "ssh://db2:2222".parse().unwrap();
        registry.parse("CpuUserTime").unwrap();
        registry.parse_for("LoadAverageLastMinute", &remote).unwrap();
        registry.parse_for("CpuUserTime", &remote).unwrap();

        let ids: Vec<String> = registry
            .definitions_for(&remote)
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["LoadAverageLastMinute", "CpuUserTime"]);
        assert_eq!(registry.definitions_for(&Address::Local).len(), 1);
    }

    #[test]
    fn test_register_keeps_first_instance() {
        let registry = Registry::new();
        let first = registry.parse("PhysicalMemoryUsed").unwrap();
        let duplicate = definition::construct("PhysicalMemoryUsed", &Address::Local).unwrap();
        let kept = registry.register(duplicate);
        assert!(Arc::ptr_eq(&first, &kept));
    }

    #[test]
    fn test_known_ids_all_resolve() {
        let registry = Registry::new();
        for id in registry.known_ids() {
            assert_eq!(registry.parse(id).unwrap().id(), id);
        }
        assert_eq!(registry.len(), registry.known_ids().len());
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = parse("LoadAverageLastFifteenMinutes").unwrap();
        let b = global().parse("LoadAverageLastFifteenMinutes").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_resolution_interns_once() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.parse("CpuStolenTime").unwrap())
            })
            .collect();
        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for d in &resolved[1..] {
            assert!(Arc::ptr_eq(&resolved[0], d));
        }
        assert_eq!(registry.len(), 1);
    }
}
