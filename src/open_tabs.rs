use std::sync::Arc;

use crate::error::{PanelError, ShellError};
use crate::item::{self, Classifier, Completion, IconKind, RunningItem};
use crate::provider::RunningItemProvider;
use crate::shell::{Entity, Shell, ShellArea};
use crate::signal::ChangeSignal;
use crate::signaler::OpenEntitySignaler;

pub const DEFAULT_PROVIDER_NAME: &str = "Open Tabs";
const SHUTDOWN_LABEL: &str = "Close";
const SHUTDOWN_ALL_LABEL: &str = "Close All";
const SHUTDOWN_ALL_CONFIRMATION: &str = "Are you sure you want to close all open tabs?";

/// Lists the entities in the shell's main area.
pub struct OpenTabsProvider {
    name: String,
    shell: Arc<dyn Shell>,
    signaler: OpenEntitySignaler,
    classifier: Classifier,
}

impl OpenTabsProvider {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        let signaler = OpenEntitySignaler::new(shell.layout_modified());
        Self {
            name: DEFAULT_PROVIDER_NAME.to_string(),
            shell,
            signaler,
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

    pub fn signaler(&self) -> &OpenEntitySignaler {
        &self.signaler
    }
}

impl RunningItemProvider for OpenTabsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn running(&self) -> Vec<Arc<dyn RunningItem>> {
        let entities = self.shell.entities(ShellArea::Main);
        {
            let ids: Vec<&str> = entities.iter().map(|e| e.id()).collect();
            self.signaler.retain(&ids);
        }
        entities
            .into_iter()
            .map(|entity| {
                self.signaler.add_entity(entity.as_ref());
                Arc::new(OpenTab {
                    entity,
                    shell: Arc::clone(&self.shell),
                    classifier: self.classifier.clone(),
                }) as Arc<dyn RunningItem>
            })
            .collect()
    }

    fn shutdown_all(&self) {
        for entity in self.shell.entities(ShellArea::Main) {
            if let Err(e) = close_tolerating_stale(self.shell.as_ref(), entity.id()) {
                tracing::warn!(tab = %entity.id(), error = %e, "failed to close tab");
            }
        }
    }

    fn refresh_running(&self) {
        // The layout signal already mirrors the shell.
    }

    fn running_changed(&self) -> &ChangeSignal {
        self.signaler.changed()
    }

    fn shutdown_label(&self) -> &str {
        SHUTDOWN_LABEL
    }

    fn shutdown_all_label(&self) -> &str {
        SHUTDOWN_ALL_LABEL
    }

    fn shutdown_all_confirmation(&self) -> &str {
        SHUTDOWN_ALL_CONFIRMATION
    }
}

/// Closing a tab that is already gone is a no-op.
fn close_tolerating_stale(shell: &dyn Shell, id: &str) -> Result<(), ShellError> {
    match shell.close(id) {
        Err(ShellError::NotFound(_)) => {
            tracing::debug!(tab = %id, "tab already closed");
            Ok(())
        }
        other => other,
    }
}

struct OpenTab {
    entity: Arc<dyn Entity>,
    shell: Arc<dyn Shell>,
    classifier: Classifier,
}

impl RunningItem for OpenTab {
    fn label(&self) -> String {
        self.entity.label()
    }

    fn label_title(&self) -> String {
        if let Some(path) = self.entity.path() {
            return path;
        }
        let caption = self.entity.caption();
        if caption.is_empty() {
            self.entity.label()
        } else {
            caption
        }
    }

    fn icon(&self) -> IconKind {
        let label = self.entity.label();
        let path = self.entity.path().unwrap_or_default();
        self.classifier
            .classify(item::display_name(&label, &path), self.entity.type_tag())
    }

    fn open(&self) -> Result<(), PanelError> {
        match self.shell.activate(self.entity.id()) {
            Err(ShellError::NotFound(_)) => {
                tracing::debug!(tab = %self.entity.id(), "tab already closed");
                Ok(())
            }
            other => other.map_err(PanelError::from),
        }
    }

    fn shutdown(&self) -> Completion {
        item::completed(
            close_tolerating_stale(self.shell.as_ref(), self.entity.id()).map_err(PanelError::from),
        )
    }
}
