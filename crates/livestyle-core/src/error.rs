//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TabId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // ─────────────────────────────────────────────────────────────
    // Resource Host Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No resource host connected for tab {tab}")]
    NoHostChannel { tab: TabId },

    #[error("Resource host channel disconnected while waiting for '{action}'")]
    ChannelDisconnected { action: String },

    #[error("No reply to '{action}' within {timeout_ms}ms")]
    ResponseTimeout { action: String, timeout_ms: u64 },

    #[error("Host protocol error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Sync Core Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Transaction cancelled: {reason}")]
    TransactionCancelled { reason: String },

    #[error("No active session for tab {tab}")]
    NoSessionForTab { tab: TabId },

    #[error("Diff engine error: {message}")]
    DiffEngine { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn channel_disconnected(action: impl Into<String>) -> Self {
        Self::ChannelDisconnected {
            action: action.into(),
        }
    }

    pub fn response_timeout(action: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ResponseTimeout {
            action: action.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::TransactionCancelled {
            reason: reason.into(),
        }
    }

    pub fn diff_engine(message: impl Into<String>) -> Self {
        Self::DiffEngine {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the per-tab channel went away under a pending request
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::ChannelDisconnected { .. })
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
