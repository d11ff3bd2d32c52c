//! Error types for fence-lsp

use thiserror::Error;

pub type FenceResult<T> = std::result::Result<T, FenceError>;

#[derive(Debug, Error)]
pub enum FenceError {
    #[error("{0}")]
    Lsp(#[from] LspError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LspError {
    #[error("Failed to start '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("{language} backend rejected initialize: {reason}")]
    HandshakeFailed { language: String, reason: String },

    #[error("Backend not connected")]
    NotConnected,

    #[error("{language} backend terminated unexpectedly")]
    ServerTerminated { language: String },

    #[error("{0}")]
    Timeout(String),

    #[error("Request cancelled")]
    RequestCancelled,

    #[error("Server error [{code}]: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LspError {
    const CANCELLED_ERROR_CODE: i32 = -32800;

    pub fn error_code(&self) -> i32 {
        match self {
            Self::ServerError { code, .. } => *code,
            Self::ServerTerminated { .. } => -32099,
            Self::Timeout(_) => -32001,
            Self::NotConnected => -32003,
            Self::RequestCancelled => Self::CANCELLED_ERROR_CODE,
            _ => -32000,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::RequestCancelled)
            || matches!(self, Self::ServerError { code, .. } if *code == Self::CANCELLED_ERROR_CODE)
    }

    /// The backend process is gone; the request can never succeed against it.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::ServerTerminated { .. } | Self::NotConnected)
    }

    pub fn spawn_failed(command: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<crate::infra::lsp::protocol::ResponseError> for LspError {
    fn from(err: crate::infra::lsp::protocol::ResponseError) -> Self {
        LspError::ServerError {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to load markdown grammar: {0}")]
    Grammar(String),

    #[error("Parser produced no tree for {0}")]
    NoTree(String),
}
