//! Engine errors

use hdom_js::JsError;

/// Errors from session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not started")]
    NotStarted,

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("could not find '{0}'")]
    NoMatch(String),

    #[error("malformed path {0}")]
    Path(String),

    #[error("script thread is gone")]
    WorkerGone,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Script(#[from] JsError),
}

impl SessionError {
    /// `window.stop()` ended the script
    pub fn is_halted(&self) -> bool {
        matches!(self, SessionError::Script(err) if err.is_halted())
    }
}

/// Errors from the control channel
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("missing argument for {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}
