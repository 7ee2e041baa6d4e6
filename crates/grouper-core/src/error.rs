use std::fmt;
use thiserror::Error;

/// A failure reported by the remote messaging platform.
///
/// Mirrors the platform's `{message, code}` error shape. `code` is absent when
/// the platform only returned free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub message: String,
    pub code: Option<String>,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// The error produced when a remote call outlives its deadline.
    pub fn deadline_exceeded(operation: &str) -> Self {
        Self::with_code(
            format!("{operation} timed out"),
            crate::error::DEADLINE_EXCEEDED,
        )
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code: {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Error code attached to remote calls that hit their deadline.
pub const DEADLINE_EXCEEDED: &str = "DEADLINE_EXCEEDED";

/// Top-level error type for Grouper collaborators.
#[derive(Debug, Error)]
pub enum GrouperError {
    /// Error from the messaging platform.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Error from the text generator.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a directory / name service.
    #[error("directory error: {0}")]
    Directory(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Handle cache / audit storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
