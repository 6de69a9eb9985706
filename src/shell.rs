//! Contracts consumed from the host application shell.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ShellError;
use crate::signal::ChangeSignal;

/// Region of the shell that hosts entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellArea {
    Main,
    Left,
    Right,
    Down,
}

/// A UI entity hosted by the shell (a tab, a side panel, ...).
pub trait Entity: Send + Sync {
    /// Stable id used for activate/close commands.
    fn id(&self) -> &str;

    /// Current title label. May change over the entity's lifetime.
    fn label(&self) -> String;

    /// Optional long-form caption; empty when unset.
    fn caption(&self) -> String;

    /// Backing document path, for entities that display a document.
    fn path(&self) -> Option<String>;

    /// Declared type tag (e.g. "notebook", "console", "file").
    fn type_tag(&self) -> &str;

    /// Title-change notification. Only entities whose title can drift while
    /// listed expose one; the open-tabs signaler tracks exactly those.
    fn title_changed(&self) -> Option<&ChangeSignal>;
}

pub trait Shell: Send + Sync {
    /// Entities currently in `area`, in shell order.
    fn entities(&self, area: ShellArea) -> Vec<Arc<dyn Entity>>;

    fn activate(&self, id: &str) -> Result<(), ShellError>;

    fn close(&self, id: &str) -> Result<(), ShellError>;

    /// Fires whenever entities are added, removed or reordered.
    fn layout_modified(&self) -> &ChangeSignal;
}

pub const CONSOLE_OPEN: &str = "console:open";
pub const DOCUMENT_OPEN: &str = "docmanager:open";

/// The shell's command channel.
pub trait CommandDispatcher: Send + Sync {
    fn execute(&self, command: &str, args: serde_json::Value) -> Result<(), ShellError>;
}
