use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::shell::Entity;
use crate::signal::{ChangeSignal, ConnectionId};

/// A connection this signaler made on one entity's title signal.
struct Subscription {
    signal: ChangeSignal,
    connection: ConnectionId,
}

impl Subscription {
    fn detach(self) {
        self.signal.disconnect(self.connection);
    }
}

struct Shared {
    /// Keyed by entity id. Private to this signaler instance.
    tracked: Mutex<HashMap<String, Subscription>>,
    changed: ChangeSignal,
}

impl Shared {
    /// One tracked title changed: the whole tracked set is stale.
    ///
    /// Every subscription is detached and the set cleared before the single
    /// aggregate emission, so a batch of simultaneous title changes yields
    /// one notification and no callbacks outlive the batch.
    fn on_title_changed(&self) {
        let drained: Vec<(String, Subscription)> = self.tracked.lock().drain().collect();
        if drained.is_empty() {
            return;
        }
        tracing::trace!(count = drained.len(), "tracked title changed; releasing subscriptions");
        for (_, subscription) in drained {
            subscription.detach();
        }
        self.changed.emit();
    }
}

/// Aggregated change feed for the shell's open entities.
///
/// Emits `changed` when the shell layout changes (entities added, removed
/// or reordered) and when the title of any tracked entity changes. An
/// entity is tracked from the moment it is passed to
/// [`add_entity`](Self::add_entity) until the next title change of any
/// tracked entity; after that it must be re-added, which normally happens
/// when the listener re-queries `running()`.
pub struct OpenEntitySignaler {
    shared: Arc<Shared>,
    layout: ChangeSignal,
    layout_connection: ConnectionId,
}

impl OpenEntitySignaler {
    pub fn new(layout_modified: &ChangeSignal) -> Self {
        let shared = Arc::new(Shared {
            tracked: Mutex::new(HashMap::new()),
            changed: ChangeSignal::new(),
        });
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let layout_connection = layout_modified.connect(move || {
            if let Some(shared) = weak.upgrade() {
                shared.changed.emit();
            }
        });
        Self {
            shared,
            layout: layout_modified.clone(),
            layout_connection,
        }
    }

    /// Start tracking `entity`'s title, if it has one.
    ///
    /// Returns true if a new subscription was made. Entities without a
    /// title signal, and entities already tracked, are left alone.
    pub fn add_entity(&self, entity: &dyn Entity) -> bool {
        let Some(signal) = entity.title_changed() else {
            return false;
        };
        let mut tracked = self.shared.tracked.lock();
        if tracked.contains_key(entity.id()) {
            return false;
        }
        let weak = Arc::downgrade(&self.shared);
        let connection = signal.connect(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_title_changed();
            }
        });
        tracked.insert(
            entity.id().to_string(),
            Subscription {
                signal: signal.clone(),
                connection,
            },
        );
        true
    }

    /// Stop tracking every entity whose id is not in `ids`.
    ///
    /// Returns the number of subscriptions released.
    pub fn retain(&self, ids: &[&str]) -> usize {
        let released: Vec<Subscription> = {
            let mut tracked = self.shared.tracked.lock();
            let stale: Vec<String> = tracked
                .keys()
                .filter(|id| !ids.contains(&id.as_str()))
                .cloned()
                .collect();
            stale.iter().filter_map(|id| tracked.remove(id)).collect()
        };
        let count = released.len();
        for subscription in released {
            subscription.detach();
        }
        if count > 0 {
            tracing::trace!(count, "released subscriptions of departed entities");
        }
        count
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.shared.tracked.lock().contains_key(id)
    }

    pub fn tracked_count(&self) -> usize {
        self.shared.tracked.lock().len()
    }

    /// The aggregate change signal.
    pub fn changed(&self) -> &ChangeSignal {
        &self.shared.changed
    }
}

impl Drop for OpenEntitySignaler {
    fn drop(&mut self) {
        self.layout.disconnect(self.layout_connection);
        let drained: Vec<(String, Subscription)> = self.shared.tracked.lock().drain().collect();
        for (_, subscription) in drained {
            subscription.detach();
        }
    }
}
