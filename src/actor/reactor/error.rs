use thiserror::Error;

use crate::model::tree::TreeError;
use crate::sys::window_system::WindowHandle;

#[derive(Debug, Error)]
pub enum CommandError {
    /// A bug in the tree code. The command was aborted before changing anything.
    #[error(transparent)]
    Internal(#[from] TreeError),
    #[error("workspace {0:?} not found")]
    WorkspaceNotFound(String),
    #[error("no monitor found")]
    MonitorNotFound,
    #[error("invalid resize amount {0:?}")]
    InvalidResizeAmount(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown binding mode {0:?}")]
    UnknownBindingMode(String),
    #[error("workspace {0:?} is not empty")]
    WorkspaceNotEmpty(String),
    #[error("workspace {0:?} is the only workspace on its monitor")]
    LastWorkspace(String),
    #[error("no window is focused")]
    NoFocusedWindow,
    #[error("window {0} is not managed")]
    WindowNotManaged(WindowHandle),
    #[error("recovery cache i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("recovery cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CommandError {
    pub fn is_internal(&self) -> bool { matches!(self, CommandError::Internal(_)) }
}

pub type CommandResult<T = ()> = Result<T, CommandError>;
