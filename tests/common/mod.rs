#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use runpanel::error::{ShellError, TransportError};
use runpanel::memory::MemoryShell;
use runpanel::session::{SessionModel, SessionTransport};
use runpanel::shell::{CommandDispatcher, Entity, Shell, ShellArea};
use runpanel::signal::ChangeSignal;

/// Count how many times `signal` fires.
pub fn count_emissions(signal: &ChangeSignal) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    signal.connect(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

pub fn load(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}

/// Await one notification on `signal`, failing the test after a second.
pub async fn expect_change(rx: &mut tokio::sync::broadcast::Receiver<()>) {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for running_changed")
        .expect("signal channel closed");
}

pub fn notebook(id: &str, name: &str) -> SessionModel {
    SessionModel {
        id: id.to_string(),
        path: format!("work/{name}"),
        name: name.to_string(),
        session_type: "notebook".to_string(),
        kernel: None,
    }
}

struct FlakyInner {
    sessions: Mutex<Vec<SessionModel>>,
    failing: HashSet<String>,
    attempts: Mutex<Vec<String>>,
    changed: ChangeSignal,
}

impl FlakyInner {
    fn shutdown_one(&self, id: &str) -> Result<(), TransportError> {
        self.attempts.lock().push(id.to_string());
        if self.failing.contains(id) {
            return Err(TransportError::Backend(anyhow::anyhow!("kernel {id} is not responding")));
        }
        let mut sessions = self.sessions.lock();
        let pos = sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| TransportError::NotFound(id.to_string()))?;
        sessions.remove(pos);
        Ok(())
    }
}

/// Transport whose shutdown fails for a chosen set of session ids.
#[derive(Clone)]
pub struct FlakyTransport {
    inner: Arc<FlakyInner>,
}

impl FlakyTransport {
    pub fn new(sessions: Vec<SessionModel>, failing: &[&str]) -> Self {
        Self {
            inner: Arc::new(FlakyInner {
                sessions: Mutex::new(sessions),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                attempts: Mutex::new(Vec::new()),
                changed: ChangeSignal::new(),
            }),
        }
    }

    /// Session ids a shutdown was attempted on, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.inner.attempts.lock().clone()
    }
}

impl SessionTransport for FlakyTransport {
    fn running(&self) -> Vec<SessionModel> {
        self.inner.sessions.lock().clone()
    }

    fn shutdown(&self, id: &str) -> BoxFuture<'static, Result<(), TransportError>> {
        let inner = Arc::clone(&self.inner);
        let id = id.to_string();
        Box::pin(async move {
            let result = inner.shutdown_one(&id);
            if result.is_ok() {
                inner.changed.emit();
            }
            result
        })
    }

    fn shutdown_all(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let ids: Vec<String> = inner.sessions.lock().iter().map(|s| s.id.clone()).collect();
            let mut first_error = None;
            for id in ids {
                if let Err(e) = inner.shutdown_one(&id) {
                    first_error.get_or_insert(e);
                }
            }
            inner.changed.emit();
            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn refresh_running(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async { Err(TransportError::Unavailable("server unreachable".into())) })
    }

    fn running_changed(&self) -> &ChangeSignal {
        &self.inner.changed
    }

    fn kernel_display_name(&self, _kernel_name: &str) -> Option<String> {
        None
    }
}

/// Command channel that recognizes no commands.
pub struct RefusingCommands;

impl CommandDispatcher for RefusingCommands {
    fn execute(&self, command: &str, _args: serde_json::Value) -> Result<(), ShellError> {
        Err(ShellError::UnknownCommand(command.to_string()))
    }
}

/// Shell whose entities cannot be brought to the foreground.
pub struct LockedShell(pub MemoryShell);

impl Shell for LockedShell {
    fn entities(&self, area: ShellArea) -> Vec<Arc<dyn Entity>> {
        self.0.entities(area)
    }

    fn activate(&self, id: &str) -> Result<(), ShellError> {
        Err(ShellError::CommandFailed {
            command: "activate".to_string(),
            reason: format!("{id} is locked"),
        })
    }

    fn close(&self, id: &str) -> Result<(), ShellError> {
        self.0.close(id)
    }

    fn layout_modified(&self) -> &ChangeSignal {
        self.0.layout_modified()
    }
}
