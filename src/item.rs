use std::future::Future;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::PanelError;

/// Outcome of an action that may finish after the call returns.
///
/// The underlying work is already dispatched when the completion is handed
/// out; dropping it does not cancel anything. Awaiting it surfaces the
/// failure, if any, to the caller.
pub type Completion = BoxFuture<'static, Result<(), PanelError>>;

/// A completion for work that already finished synchronously.
pub fn completed(result: Result<(), PanelError>) -> Completion {
    Box::pin(futures::future::ready(result))
}

/// Spawn `fut` on the current tokio runtime right away and return its
/// completion.
///
/// Called outside a runtime, the request is dropped and the completion
/// resolves to [`PanelError::Dispatch`].
pub fn dispatch<F>(fut: F) -> Completion
where
    F: Future<Output = Result<(), PanelError>> + Send + 'static,
{
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(error = %e, "no async runtime; request dropped");
            return completed(Err(PanelError::Dispatch(e.to_string())));
        }
    };
    let handle = runtime.spawn(fut);
    Box::pin(async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(PanelError::Dispatch(e.to_string())),
        }
    })
}

/// Icon class shown next to a running item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconKind {
    Notebook,
    Console,
    File,
}

/// One displayable running entity.
///
/// Items have no identity beyond the object itself: two calls to a
/// provider's `running()` may hand out different objects for the same
/// underlying entity.
pub trait RunningItem: Send + Sync {
    /// Short label shown in the panel.
    fn label(&self) -> String;

    /// Long-form detail text (tooltip).
    fn label_title(&self) -> String;

    fn icon(&self) -> IconKind;

    /// Bring the entity to the foreground in its owning subsystem.
    fn open(&self) -> Result<(), PanelError>;

    /// Ask the owning subsystem to terminate the entity.
    fn shutdown(&self) -> Completion;
}

/// Serializable view of a [`RunningItem`] at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    pub label: String,
    pub label_title: String,
    pub icon: IconKind,
}

impl ItemSnapshot {
    pub fn capture(item: &dyn RunningItem) -> Self {
        Self {
            label: item.label(),
            label_title: item.label_title(),
            icon: item.icon(),
        }
    }
}

/// Icon classification policy for notebook, console and file entities.
///
/// The extension check always runs before the type-tag check, so a console
/// whose transcript is saved to a notebook file shows as a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    /// Marker searched for (as a substring) in the entity's name.
    pub notebook_extension: String,
    /// Type tag, compared case-insensitively, that marks a console.
    pub console_type: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            notebook_extension: ".ipynb".to_string(),
            console_type: "console".to_string(),
        }
    }
}

impl Classifier {
    pub fn classify(&self, name: &str, type_tag: &str) -> IconKind {
        if !self.notebook_extension.is_empty() && name.contains(&self.notebook_extension) {
            IconKind::Notebook
        } else if self.is_console(type_tag) {
            IconKind::Console
        } else {
            IconKind::File
        }
    }

    pub fn is_console(&self, type_tag: &str) -> bool {
        type_tag.eq_ignore_ascii_case(&self.console_type)
    }
}

/// Last `/`-separated component of `path`.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The identifying name of an entity: its explicit name when set, else the
/// basename of its path.
pub fn display_name<'a>(name: &'a str, path: &'a str) -> &'a str {
    if name.is_empty() {
        basename(path)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notebook_extension_wins_over_console_tag() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("log.ipynb", "console"), IconKind::Notebook);
    }

    #[test]
    fn console_tag_is_case_insensitive() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("Console 1", "Console"), IconKind::Console);
        assert_eq!(classifier.classify("Console 1", "CONSOLE"), IconKind::Console);
    }

    #[test]
    fn everything_else_is_a_file() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("script.py", "file"), IconKind::File);
        assert_eq!(classifier.classify("", ""), IconKind::File);
    }

    #[test]
    fn extension_marker_matches_anywhere_in_name() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("draft.ipynb.bak", "file"),
            IconKind::Notebook
        );
    }

    #[test]
    fn custom_markers_are_honoured() {
        let classifier = Classifier {
            notebook_extension: ".nb".into(),
            console_type: "repl".into(),
        };
        assert_eq!(classifier.classify("a.nb", "repl"), IconKind::Notebook);
        assert_eq!(classifier.classify("a.ipynb", "REPL"), IconKind::Console);
    }

    #[test]
    fn basename_and_display_name() {
        assert_eq!(basename("work/notes/a.ipynb"), "a.ipynb");
        assert_eq!(basename("plain"), "plain");
        assert_eq!(basename(""), "");
        assert_eq!(display_name("", "dir/b.py"), "b.py");
        assert_eq!(display_name("explicit", "dir/b.py"), "explicit");
    }

    #[test]
    fn icon_kind_serializes_snake_case() {
        let json = serde_json::to_string(&IconKind::Notebook).unwrap();
        assert_eq!(json, "\"notebook\"");
    }

    #[tokio::test]
    async fn dispatch_runs_without_being_awaited() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let completion = dispatch(async move {
            let _ = tx.send(());
            Ok(())
        });
        drop(completion);
        rx.await.expect("dispatched work should run even when dropped");
    }

    #[tokio::test]
    async fn dispatch_surfaces_errors() {
        let completion = dispatch(async { Err(PanelError::MissingCapability("running")) });
        let err = completion.await.unwrap_err();
        assert!(matches!(err, PanelError::MissingCapability("running")));
    }

    #[test]
    fn dispatch_outside_runtime_fails_without_panicking() {
        let completion = dispatch(async { Ok(()) });
        let err = futures::executor::block_on(completion).unwrap_err();
        assert!(matches!(err, PanelError::Dispatch(_)));
    }
}
