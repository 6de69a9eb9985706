use std::sync::Arc;

use crate::config::WorkspaceConfig;
use crate::error::PanelError;
use crate::memory::{
    MemoryCommands, MemoryEntity, MemorySessionManager, MemorySessionServer, MemoryShell,
};
use crate::open_tabs::OpenTabsProvider;
use crate::registry::ProviderRegistry;
use crate::session::SessionRunningAdapter;

/// Everything the panel needs, wired together once at startup.
///
/// The registry is handed out by clone to whoever displays or drives the
/// panel; the collaborators stay reachable for inspection.
pub struct Workspace {
    pub registry: ProviderRegistry,
    pub shell: MemoryShell,
    pub server: MemorySessionServer,
    pub sessions: Arc<MemorySessionManager>,
    pub commands: Arc<MemoryCommands>,
}

impl Workspace {
    /// Materialize `config` into in-memory collaborators and register the
    /// open-tabs provider followed by the session provider.
    pub fn from_config(config: &WorkspaceConfig) -> Result<Self, PanelError> {
        let shell = MemoryShell::new();
        for tab in &config.tabs {
            let tracked = tab.path.is_some();
            shell.add(
                tab.area,
                MemoryEntity::from_parts(
                    tab.label.clone(),
                    tab.caption.clone(),
                    tab.path.clone(),
                    tab.type_tag.clone(),
                    tab.pinned,
                    tracked,
                ),
            );
        }

        let server = MemorySessionServer::new();
        for session in &config.sessions {
            server.start(
                &session.path,
                &session.name,
                &session.session_type,
                session.kernel.as_deref(),
            );
        }

        let mut manager = MemorySessionManager::new(server.clone());
        for spec in &config.kernel_specs {
            manager = manager.with_kernel_spec(spec.name.clone(), spec.display_name.clone());
        }
        manager.sync_now();
        let sessions = Arc::new(manager);
        let commands = Arc::new(MemoryCommands::new());

        let mut tabs = OpenTabsProvider::new(Arc::new(shell.clone()))
            .with_classifier(config.classify.clone());
        if let Some(name) = &config.labels.open_tabs {
            tabs = tabs.with_name(name.clone());
        }
        let mut kernels = SessionRunningAdapter::new(sessions.clone(), commands.clone())
            .with_classifier(config.classify.clone());
        if let Some(name) = &config.labels.sessions {
            kernels = kernels.with_name(name.clone());
        }

        let registry = ProviderRegistry::new();
        registry.add(Arc::new(tabs))?;
        registry.add(Arc::new(kernels))?;

        tracing::info!(
            tabs = shell.len(),
            sessions = config.sessions.len(),
            "workspace ready"
        );

        Ok(Self {
            registry,
            shell,
            server,
            sessions,
            commands,
        })
    }
}
