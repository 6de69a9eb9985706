//! In-process implementations of the shell and session-transport contracts.
//!
//! Used by the CLI to materialize a workspace file, and by tests.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{ShellError, TransportError};
use crate::session::{KernelModel, SessionModel, SessionTransport};
use crate::shell::{CommandDispatcher, Entity, Shell, ShellArea};
use crate::signal::ChangeSignal;

// ── Shell ──────────────────────────────────────────────────────────

/// A tab or panel hosted by a [`MemoryShell`].
pub struct MemoryEntity {
    id: String,
    label: RwLock<String>,
    caption: String,
    path: Option<String>,
    type_tag: String,
    pinned: bool,
    title_changed: Option<ChangeSignal>,
}

impl MemoryEntity {
    /// A document tab. Its title may change, so it exposes a title signal.
    pub fn document(
        label: impl Into<String>,
        path: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            label: RwLock::new(label.into()),
            caption: String::new(),
            path: Some(path.into()),
            type_tag: type_tag.into(),
            pinned: false,
            title_changed: Some(ChangeSignal::new()),
        })
    }

    /// A non-document widget with a fixed title.
    pub fn widget(label: impl Into<String>, type_tag: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            label: RwLock::new(label.into()),
            caption: String::new(),
            path: None,
            type_tag: type_tag.into(),
            pinned: false,
            title_changed: None,
        })
    }

    /// Build an entity from its parts. `tracked` controls whether it exposes
    /// a title signal.
    pub fn from_parts(
        label: String,
        caption: String,
        path: Option<String>,
        type_tag: String,
        pinned: bool,
        tracked: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            label: RwLock::new(label),
            caption,
            path,
            type_tag,
            pinned,
            title_changed: tracked.then(ChangeSignal::new),
        })
    }

    /// Change the title, then announce it.
    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.write() = label.into();
        if let Some(signal) = &self.title_changed {
            signal.emit();
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

impl Entity for MemoryEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.label.read().clone()
    }

    fn caption(&self) -> String {
        self.caption.clone()
    }

    fn path(&self) -> Option<String> {
        self.path.clone()
    }

    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn title_changed(&self) -> Option<&ChangeSignal> {
        self.title_changed.as_ref()
    }
}

struct ShellInner {
    entities: Vec<(ShellArea, Arc<MemoryEntity>)>,
    active: Option<String>,
}

/// Host shell keeping its entities in memory.
#[derive(Clone)]
pub struct MemoryShell {
    inner: Arc<RwLock<ShellInner>>,
    layout_modified: ChangeSignal,
}

impl Default for MemoryShell {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ShellInner {
                entities: Vec::new(),
                active: None,
            })),
            layout_modified: ChangeSignal::new(),
        }
    }

    /// Add an entity at the end of `area` and announce the layout change.
    pub fn add(&self, area: ShellArea, entity: Arc<MemoryEntity>) {
        self.inner.write().entities.push((area, entity));
        self.layout_modified.emit();
    }

    /// Id of the most recently activated entity, if it is still open.
    pub fn active(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Shell for MemoryShell {
    fn entities(&self, area: ShellArea) -> Vec<Arc<dyn Entity>> {
        self.inner
            .read()
            .entities
            .iter()
            .filter(|(a, _)| *a == area)
            .map(|(_, e)| Arc::clone(e) as Arc<dyn Entity>)
            .collect()
    }

    fn activate(&self, id: &str) -> Result<(), ShellError> {
        let mut inner = self.inner.write();
        if !inner.entities.iter().any(|(_, e)| e.id == id) {
            return Err(ShellError::NotFound(id.to_string()));
        }
        inner.active = Some(id.to_string());
        Ok(())
    }

    fn close(&self, id: &str) -> Result<(), ShellError> {
        {
            let mut inner = self.inner.write();
            let pos = inner
                .entities
                .iter()
                .position(|(_, e)| e.id == id)
                .ok_or_else(|| ShellError::NotFound(id.to_string()))?;
            if inner.entities[pos].1.pinned {
                return Err(ShellError::CloseRejected(id.to_string()));
            }
            inner.entities.remove(pos);
            if inner.active.as_deref() == Some(id) {
                inner.active = None;
            }
        }
        self.layout_modified.emit();
        Ok(())
    }

    fn layout_modified(&self) -> &ChangeSignal {
        &self.layout_modified
    }
}

/// Command channel that records what it was asked to run.
#[derive(Default)]
pub struct MemoryCommands {
    executed: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<(String, serde_json::Value)> {
        self.executed.lock().clone()
    }
}

impl CommandDispatcher for MemoryCommands {
    fn execute(&self, command: &str, args: serde_json::Value) -> Result<(), ShellError> {
        tracing::debug!(command, %args, "executing command");
        self.executed.lock().push((command.to_string(), args));
        Ok(())
    }
}

// ── Sessions ───────────────────────────────────────────────────────

/// The source of truth for compute sessions.
///
/// Stands in for the remote server: mutating it does not notify any
/// manager until that manager refreshes.
#[derive(Clone, Default)]
pub struct MemorySessionServer {
    sessions: Arc<RwLock<Vec<SessionModel>>>,
}

impl MemorySessionServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its id.
    pub fn start(
        &self,
        path: &str,
        name: &str,
        session_type: &str,
        kernel: Option<&str>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.insert(SessionModel {
            id: id.clone(),
            path: path.to_string(),
            name: name.to_string(),
            session_type: session_type.to_string(),
            kernel: kernel.map(|k| KernelModel {
                id: Uuid::new_v4().to_string(),
                name: k.to_string(),
            }),
        });
        id
    }

    pub fn insert(&self, model: SessionModel) {
        self.sessions.write().push(model);
    }

    pub fn remove(&self, id: &str) -> Option<SessionModel> {
        let mut sessions = self.sessions.write();
        let pos = sessions.iter().position(|s| s.id == id)?;
        Some(sessions.remove(pos))
    }

    pub fn list(&self) -> Vec<SessionModel> {
        self.sessions.read().clone()
    }
}

/// Copies the server's list into the manager's cache.
#[derive(Clone)]
struct CacheSync {
    server: MemorySessionServer,
    cache: Arc<RwLock<Vec<SessionModel>>>,
    changed: ChangeSignal,
}

impl CacheSync {
    /// Returns true (after emitting) if the cache changed.
    fn sync(&self) -> bool {
        let fresh = self.server.list();
        {
            let mut cache = self.cache.write();
            if *cache == fresh {
                return false;
            }
            *cache = fresh;
        }
        self.changed.emit();
        true
    }
}

/// Client-side view of a [`MemorySessionServer`].
///
/// `running()` answers from a cache that only moves on `refresh_running`,
/// `shutdown` and `shutdown_all`.
pub struct MemorySessionManager {
    sync: CacheSync,
    kernel_specs: HashMap<String, String>,
}

impl MemorySessionManager {
    pub fn new(server: MemorySessionServer) -> Self {
        Self {
            sync: CacheSync {
                server,
                cache: Arc::new(RwLock::new(Vec::new())),
                changed: ChangeSignal::new(),
            },
            kernel_specs: HashMap::new(),
        }
    }

    /// Register a kernel spec's display name.
    pub fn with_kernel_spec(
        mut self,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        self.kernel_specs.insert(name.into(), display_name.into());
        self
    }

    /// Resynchronize on the caller's thread. Returns true if the cache changed.
    pub fn sync_now(&self) -> bool {
        self.sync.sync()
    }
}

impl SessionTransport for MemorySessionManager {
    fn running(&self) -> Vec<SessionModel> {
        self.sync.cache.read().clone()
    }

    fn shutdown(&self, id: &str) -> BoxFuture<'static, Result<(), TransportError>> {
        let sync = self.sync.clone();
        let id = id.to_string();
        Box::pin(async move {
            let removed = sync.server.remove(&id);
            sync.sync();
            match removed {
                Some(_) => Ok(()),
                None => Err(TransportError::NotFound(id)),
            }
        })
    }

    fn shutdown_all(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let sync = self.sync.clone();
        Box::pin(async move {
            for session in sync.server.list() {
                if sync.server.remove(&session.id).is_none() {
                    tracing::warn!(session = %session.id, "session vanished during shutdown");
                }
            }
            sync.sync();
            Ok(())
        })
    }

    fn refresh_running(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let sync = self.sync.clone();
        Box::pin(async move {
            sync.sync();
            Ok(())
        })
    }

    fn running_changed(&self) -> &ChangeSignal {
        &self.sync.changed
    }

    fn kernel_display_name(&self, kernel_name: &str) -> Option<String> {
        self.kernel_specs.get(kernel_name).cloned()
    }
}
