use std::sync::Arc;

use crate::error::PanelError;
use crate::item::RunningItem;
use crate::signal::ChangeSignal;

pub const DEFAULT_SHUTDOWN_LABEL: &str = "Shut Down";
pub const DEFAULT_SHUTDOWN_ALL_LABEL: &str = "Shut Down All";
pub const DEFAULT_SHUTDOWN_ALL_CONFIRMATION: &str =
    "Are you sure you want to permanently shut down all running sessions?";

/// One source of running items.
///
/// A provider is created and owned by the subsystem it wraps; the
/// [`ProviderRegistry`](crate::registry::ProviderRegistry) only holds a
/// shared reference to it.
///
/// `running()` is called on every render pass: it must be synchronous,
/// non-destructive and free of blocking I/O. `shutdown_all()` and
/// `refresh_running()` are requests, not operations: they may still be in
/// flight when they return, and their effect is announced only through
/// `running_changed()`.
pub trait RunningItemProvider: Send + Sync {
    /// Group name shown in the panel.
    fn name(&self) -> &str;

    /// Snapshot of the items currently running.
    fn running(&self) -> Vec<Arc<dyn RunningItem>>;

    /// Attempt to terminate every item this provider currently reports.
    /// A failure on one item never prevents attempting the rest.
    fn shutdown_all(&self);

    /// Ask the provider to resynchronize with its source of truth.
    fn refresh_running(&self);

    /// Fires after the provider's state changed. Listeners re-query
    /// `running()`.
    fn running_changed(&self) -> &ChangeSignal;

    fn shutdown_label(&self) -> &str {
        DEFAULT_SHUTDOWN_LABEL
    }

    fn shutdown_all_label(&self) -> &str {
        DEFAULT_SHUTDOWN_ALL_LABEL
    }

    fn shutdown_all_confirmation(&self) -> &str {
        DEFAULT_SHUTDOWN_ALL_CONFIRMATION
    }
}

type RunningFn = Box<dyn Fn() -> Vec<Arc<dyn RunningItem>> + Send + Sync>;
type ActionFn = Box<dyn Fn() + Send + Sync>;

/// Provider assembled from closures.
pub struct FnProvider {
    name: String,
    running: RunningFn,
    shutdown_all: Option<ActionFn>,
    refresh_running: Option<ActionFn>,
    running_changed: ChangeSignal,
    shutdown_label: String,
    shutdown_all_label: String,
    shutdown_all_confirmation: String,
}

impl FnProvider {
    pub fn builder(name: impl Into<String>) -> FnProviderBuilder {
        FnProviderBuilder {
            name: name.into(),
            running: None,
            shutdown_all: None,
            refresh_running: None,
            running_changed: None,
            shutdown_label: None,
            shutdown_all_label: None,
            shutdown_all_confirmation: None,
        }
    }
}

impl RunningItemProvider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn running(&self) -> Vec<Arc<dyn RunningItem>> {
        (self.running)()
    }

    fn shutdown_all(&self) {
        if let Some(f) = &self.shutdown_all {
            f();
        }
    }

    fn refresh_running(&self) {
        if let Some(f) = &self.refresh_running {
            f();
        }
    }

    fn running_changed(&self) -> &ChangeSignal {
        &self.running_changed
    }

    fn shutdown_label(&self) -> &str {
        &self.shutdown_label
    }

    fn shutdown_all_label(&self) -> &str {
        &self.shutdown_all_label
    }

    fn shutdown_all_confirmation(&self) -> &str {
        &self.shutdown_all_confirmation
    }
}

/// Builder for [`FnProvider`]. `running` is required; everything else
/// has a default.
pub struct FnProviderBuilder {
    name: String,
    running: Option<RunningFn>,
    shutdown_all: Option<ActionFn>,
    refresh_running: Option<ActionFn>,
    running_changed: Option<ChangeSignal>,
    shutdown_label: Option<String>,
    shutdown_all_label: Option<String>,
    shutdown_all_confirmation: Option<String>,
}

impl FnProviderBuilder {
    pub fn running<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Vec<Arc<dyn RunningItem>> + Send + Sync + 'static,
    {
        self.running = Some(Box::new(f));
        self
    }

    pub fn shutdown_all<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shutdown_all = Some(Box::new(f));
        self
    }

    pub fn refresh_running<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.refresh_running = Some(Box::new(f));
        self
    }

    /// Use an existing signal (e.g. one owned by the wrapped subsystem)
    /// instead of a fresh one.
    pub fn running_changed(mut self, signal: ChangeSignal) -> Self {
        self.running_changed = Some(signal);
        self
    }

    pub fn shutdown_label(mut self, label: impl Into<String>) -> Self {
        self.shutdown_label = Some(label.into());
        self
    }

    pub fn shutdown_all_label(mut self, label: impl Into<String>) -> Self {
        self.shutdown_all_label = Some(label.into());
        self
    }

    pub fn shutdown_all_confirmation(mut self, text: impl Into<String>) -> Self {
        self.shutdown_all_confirmation = Some(text.into());
        self
    }

    pub fn build(self) -> Result<FnProvider, PanelError> {
        let running = self
            .running
            .ok_or(PanelError::MissingCapability("running"))?;
        Ok(FnProvider {
            name: self.name,
            running,
            shutdown_all: self.shutdown_all,
            refresh_running: self.refresh_running,
            running_changed: self.running_changed.unwrap_or_default(),
            shutdown_label: self
                .shutdown_label
                .unwrap_or_else(|| DEFAULT_SHUTDOWN_LABEL.to_string()),
            shutdown_all_label: self
                .shutdown_all_label
                .unwrap_or_else(|| DEFAULT_SHUTDOWN_ALL_LABEL.to_string()),
            shutdown_all_confirmation: self
                .shutdown_all_confirmation
                .unwrap_or_else(|| DEFAULT_SHUTDOWN_ALL_CONFIRMATION.to_string()),
        })
    }
}
