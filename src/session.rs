use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::{PanelError, TransportError};
use crate::item::{self, Classifier, Completion, IconKind, RunningItem};
use crate::provider::RunningItemProvider;
use crate::shell::{CommandDispatcher, CONSOLE_OPEN, DOCUMENT_OPEN};
use crate::signal::ChangeSignal;

pub const DEFAULT_PROVIDER_NAME: &str = "Kernels";

/// Kernel attached to a compute session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelModel {
    pub id: String,
    /// Kernel spec name, e.g. "python3".
    pub name: String,
}

/// One compute session as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub session_type: String,
    #[serde(default)]
    pub kernel: Option<KernelModel>,
}

impl SessionModel {
    /// Explicit name, else the basename of the path.
    pub fn display_name(&self) -> &str {
        item::display_name(&self.name, &self.path)
    }

    /// Whether the session belongs in the panel.
    ///
    /// Sessions with neither a dotted display name nor an explicit name are
    /// transient (unnamed kernels started by tooling) and are hidden.
    pub fn is_listed(&self) -> bool {
        self.display_name().contains('.') || !self.name.is_empty()
    }
}

/// Compute-session lifecycle calls consumed by the adapter.
///
/// `running()` answers from the transport's local cache and must not block.
/// The remaining calls return `'static` futures so callers can hand them
/// to the runtime; a transport announces every state change they cause on
/// `running_changed()`, after applying it.
pub trait SessionTransport: Send + Sync {
    fn running(&self) -> Vec<SessionModel>;

    fn shutdown(&self, id: &str) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Shut down every session, continuing past individual failures.
    fn shutdown_all(&self) -> BoxFuture<'static, Result<(), TransportError>>;

    fn refresh_running(&self) -> BoxFuture<'static, Result<(), TransportError>>;

    fn running_changed(&self) -> &ChangeSignal;

    /// Human-readable name for a kernel spec, if known.
    fn kernel_display_name(&self, kernel_name: &str) -> Option<String>;
}

/// Exposes a [`SessionTransport`] as a running-item provider.
pub struct SessionRunningAdapter {
    name: String,
    transport: Arc<dyn SessionTransport>,
    commands: Arc<dyn CommandDispatcher>,
    classifier: Classifier,
}

impl SessionRunningAdapter {
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        commands: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self {
            name: DEFAULT_PROVIDER_NAME.to_string(),
            transport,
            commands,
            classifier: Classifier::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }
}

impl RunningItemProvider for SessionRunningAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn running(&self) -> Vec<Arc<dyn RunningItem>> {
        self.transport
            .running()
            .into_iter()
            .filter(SessionModel::is_listed)
            .map(|model| {
                Arc::new(SessionItem {
                    model,
                    transport: Arc::clone(&self.transport),
                    commands: Arc::clone(&self.commands),
                    classifier: self.classifier.clone(),
                }) as Arc<dyn RunningItem>
            })
            .collect()
    }

    fn shutdown_all(&self) {
        spawn_request(&self.name, "shutdown_all", self.transport.shutdown_all());
    }

    fn refresh_running(&self) {
        spawn_request(&self.name, "refresh", self.transport.refresh_running());
    }

    fn running_changed(&self) -> &ChangeSignal {
        self.transport.running_changed()
    }
}

/// Run a fire-and-forget transport request, logging its failure.
///
/// Outside a tokio runtime the request is dropped with a warning.
fn spawn_request(
    provider: &str,
    request: &'static str,
    fut: BoxFuture<'static, Result<(), TransportError>>,
) {
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(%provider, request, error = %e, "no async runtime; request dropped");
            return;
        }
    };
    let provider = provider.to_string();
    runtime.spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!(%provider, request, error = %e, "session request failed");
        }
    });
}

struct SessionItem {
    model: SessionModel,
    transport: Arc<dyn SessionTransport>,
    commands: Arc<dyn CommandDispatcher>,
    classifier: Classifier,
}

impl RunningItem for SessionItem {
    fn label(&self) -> String {
        self.model.display_name().to_string()
    }

    fn label_title(&self) -> String {
        let mut title = format!("Path: {}", self.model.path);
        if let Some(kernel) = &self.model.kernel {
            let kernel_name = self
                .transport
                .kernel_display_name(&kernel.name)
                .unwrap_or_else(|| kernel.name.clone());
            title.push_str(&format!("\nKernel: {kernel_name}"));
        }
        title
    }

    fn icon(&self) -> IconKind {
        self.classifier
            .classify(self.model.display_name(), &self.model.session_type)
    }

    fn open(&self) -> Result<(), PanelError> {
        let command = if self.classifier.is_console(&self.model.session_type) {
            CONSOLE_OPEN
        } else {
            DOCUMENT_OPEN
        };
        tracing::debug!(session = %self.model.id, command, "opening session");
        self.commands
            .execute(command, serde_json::json!({ "path": self.model.path }))?;
        Ok(())
    }

    fn shutdown(&self) -> Completion {
        tracing::debug!(session = %self.model.id, "shutting down session");
        let fut = self.transport.shutdown(&self.model.id);
        item::dispatch(async move { fut.await.map_err(PanelError::from) })
    }
}
