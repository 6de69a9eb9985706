/// Errors raised by the panel core and the providers built on it.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// A provider was assembled or registered without a required capability.
    #[error("provider is missing required capability: {0}")]
    MissingCapability(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Shell(#[from] ShellError),

    /// A dispatched task panicked or was aborted before reporting back.
    #[error("dispatched task failed: {0}")]
    Dispatch(String),
}

/// Failures sourced from a compute-session transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session transport unavailable: {0}")]
    Unavailable(String),
    #[error("session backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Failures sourced from the host shell.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("entity refused to close: {0}")]
    CloseRejected(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
}
