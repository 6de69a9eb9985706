use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::PanelError;
use crate::item::ItemSnapshot;
use crate::provider::RunningItemProvider;

/// Identifier assigned to a provider when it is added. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProviderId(u64);

/// Registry lifecycle events.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added { id: ProviderId, name: String },
    Removed { id: ProviderId, name: String },
}

/// Serializable view of one provider and its items.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    pub shutdown_label: String,
    pub shutdown_all_label: String,
    pub items: Vec<ItemSnapshot>,
}

struct RegistryInner {
    providers: Vec<(ProviderId, Arc<dyn RunningItemProvider>)>,
    next_id: u64,
}

/// Ordered collection of running-item providers.
///
/// Registration order is the display order of the provider groups and is
/// preserved across removals. The registry is constructed once and shared
/// by cloning; clones see the same providers.
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    events_tx: broadcast::Sender<RegistryEvent>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create an empty registry with a broadcast channel for lifecycle events.
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                providers: Vec::new(),
                next_id: 0,
            })),
            events_tx,
        }
    }

    /// Append a provider.
    ///
    /// Fails with `PanelError::MissingCapability("name")` if the provider has
    /// no usable name. Duplicate names are accepted.
    pub fn add(
        &self,
        provider: Arc<dyn RunningItemProvider>,
    ) -> Result<ProviderHandle, PanelError> {
        let name = provider.name().to_string();
        if name.trim().is_empty() {
            return Err(PanelError::MissingCapability("name"));
        }

        let id = {
            let mut inner = self.inner.write();
            if inner.providers.iter().any(|(_, p)| p.name() == name) {
                tracing::warn!(
                    provider = %name,
                    "provider name already registered; groups will be ambiguous"
                );
            }
            let id = ProviderId(inner.next_id);
            inner.next_id += 1;
            inner.providers.push((id, provider));
            id
        };

        tracing::debug!(provider = %name, ?id, "provider registered");
        let _ = self.events_tx.send(RegistryEvent::Added { id, name });

        Ok(ProviderHandle {
            id,
            registry: Arc::downgrade(&self.inner),
            events_tx: self.events_tx.clone(),
        })
    }

    /// Remove a provider by id. Returns true if it was registered.
    pub fn remove(&self, id: ProviderId) -> bool {
        remove_from(&self.inner, &self.events_tx, id)
    }

    /// Snapshot of the providers in registration order.
    ///
    /// The snapshot is detached from the registry, so callers may add or
    /// remove providers while iterating it.
    pub fn providers(&self) -> Vec<Arc<dyn RunningItemProvider>> {
        self.inner
            .read()
            .providers
            .iter()
            .map(|(_, p)| Arc::clone(p))
            .collect()
    }

    /// First provider registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn RunningItemProvider>> {
        self.inner
            .read()
            .providers
            .iter()
            .find(|(_, p)| p.name() == name)
            .map(|(_, p)| Arc::clone(p))
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.inner.read().providers.iter().any(|(pid, _)| *pid == id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture every provider's current items.
    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        self.providers()
            .iter()
            .map(|provider| ProviderSnapshot {
                name: provider.name().to_string(),
                shutdown_label: provider.shutdown_label().to_string(),
                shutdown_all_label: provider.shutdown_all_label().to_string(),
                items: provider
                    .running()
                    .iter()
                    .map(|item| ItemSnapshot::capture(item.as_ref()))
                    .collect(),
            })
            .collect()
    }

    /// Ask every provider to resynchronize.
    pub fn refresh_all(&self) {
        for provider in self.providers() {
            provider.refresh_running();
        }
    }

    /// Subscribe to registry lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events_tx.subscribe()
    }
}

fn remove_from(
    inner: &RwLock<RegistryInner>,
    events_tx: &broadcast::Sender<RegistryEvent>,
    id: ProviderId,
) -> bool {
    let removed = {
        let mut inner = inner.write();
        let pos = inner.providers.iter().position(|(pid, _)| *pid == id);
        pos.map(|pos| inner.providers.remove(pos))
    };
    match removed {
        Some((id, provider)) => {
            let name = provider.name().to_string();
            tracing::debug!(provider = %name, ?id, "provider removed");
            let _ = events_tx.send(RegistryEvent::Removed { id, name });
            true
        }
        None => false,
    }
}

/// Handle returned by [`ProviderRegistry::add`].
///
/// Dropping the handle leaves the provider registered; call
/// [`dispose`](Self::dispose) to remove it.
pub struct ProviderHandle {
    id: ProviderId,
    registry: Weak<RwLock<RegistryInner>>,
    events_tx: broadcast::Sender<RegistryEvent>,
}

impl ProviderHandle {
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Remove the provider from the registry. Returns false if it was
    /// already removed or the registry is gone.
    pub fn dispose(self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => remove_from(&inner, &self.events_tx, self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FnProvider;

    fn provider(name: &str) -> Arc<dyn RunningItemProvider> {
        Arc::new(FnProvider::builder(name).running(Vec::new).build().unwrap())
    }

    fn names(registry: &ProviderRegistry) -> Vec<String> {
        registry
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn iteration_follows_registration_order() {
        let registry = ProviderRegistry::new();
        for name in ["tabs", "kernels", "terminals", "aardvark"] {
            registry.add(provider(name)).unwrap();
        }
        assert_eq!(names(&registry), vec!["tabs", "kernels", "terminals", "aardvark"]);
    }

    #[test]
    fn dispose_removes_only_that_provider() {
        let registry = ProviderRegistry::new();
        registry.add(provider("a")).unwrap();
        let b = registry.add(provider("b")).unwrap();
        registry.add(provider("c")).unwrap();

        let id = b.id();
        assert!(b.dispose());

        assert_eq!(names(&registry), vec!["a", "c"]);
        assert!(!registry.contains(id));
        assert!(!registry.remove(id), "second removal should report false");
    }

    #[test]
    fn dropping_handle_keeps_provider() {
        let registry = ProviderRegistry::new();
        drop(registry.add(provider("kept")).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_name_is_a_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.add(provider("  ")).err().unwrap();
        assert!(matches!(err, PanelError::MissingCapability("name")));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_names_are_allowed() {
        let registry = ProviderRegistry::new();
        let first = registry.add(provider("same")).unwrap();
        let second = registry.add(provider("same")).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn iteration_snapshot_survives_mutation() {
        let registry = ProviderRegistry::new();
        registry.add(provider("a")).unwrap();
        registry.add(provider("b")).unwrap();

        let mut seen = Vec::new();
        for p in registry.providers() {
            seen.push(p.name().to_string());
            registry.add(provider("late")).unwrap();
        }

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn get_returns_first_match() {
        let registry = ProviderRegistry::new();
        registry.add(provider("x")).unwrap();
        assert!(registry.get("x").is_some());
        assert!(registry.get("y").is_none());
    }

    #[test]
    fn dispose_after_registry_dropped_is_false() {
        let registry = ProviderRegistry::new();
        let handle = registry.add(provider("a")).unwrap();
        drop(registry);
        assert!(!handle.dispose());
    }

    #[tokio::test]
    async fn lifecycle_events_are_broadcast() {
        let registry = ProviderRegistry::new();
        let mut events = registry.subscribe_events();

        let handle = registry.add(provider("watched")).unwrap();
        handle.dispose();

        match events.recv().await.unwrap() {
            RegistryEvent::Added { name, .. } => assert_eq!(name, "watched"),
            other => panic!("expected Added, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            RegistryEvent::Removed { name, .. } => assert_eq!(name, "watched"),
            other => panic!("expected Removed, got {other:?}"),
        }
    }
}
