use std::{io, path::PathBuf};
use thiserror::Error;

/// failures talking to the os brightness service
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to enumerate monitors: {0}")]
    Enumerate(String),

    #[error("monitor `{0}` is not connected anymore")]
    UnknownMonitor(String),

    #[error("failed to read brightness of `{monitor}`: {reason}")]
    Read { monitor: String, reason: String },

    #[error("failed to set brightness of `{monitor}`: {reason}")]
    Write { monitor: String, reason: String },

    #[error("brightness control is not supported on this platform")]
    Unsupported,
}

/// failures installing the login launch entry
#[derive(Debug, Error)]
pub enum AutostartError {
    #[error("could not resolve the current executable")]
    Executable(#[source] io::Error),

    #[error("could not locate the user's startup folder")]
    StartupFolder,

    #[error("failed to create startup shortcut at {path:?}: {reason}")]
    Shortcut { path: PathBuf, reason: String },

    #[error("failed to update the run key: {0}")]
    Registry(String),

    #[error("autostart is not supported on this platform")]
    Unsupported,
}
