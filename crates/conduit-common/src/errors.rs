use std::path::PathBuf;

use crate::types::ContentsId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// The caller used the registry in a way that would break it.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("invalid arguments on channel {channel}: {reason}")]
    InvalidArguments { channel: String, reason: String },

    #[error("failed to send on channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("native capture failed: {0}")]
    NativeFailure(String),

    #[error("thumbnail encoding failed: {0}")]
    Encode(String),

    #[error("capture request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("window creation failed: {0}")]
    CreateFailed(String),

    #[error("failed to load {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("no window for contents {0}")]
    NotFound(ContentsId),
}

#[derive(Debug, thiserror::Error)]
pub enum ConduitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
