//! Error types for deployment operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Result type for remote file client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while resolving targets or moving files.
#[derive(Debug, Error)]
pub enum DeployError {
    /// At least one requested target name has no match.
    #[error("At least one target could not be found: {}", names.join(", "))]
    TargetNotFound { names: Vec<String> },

    /// A meta-target lists itself as a sub-target.
    #[error("Cannot use target '{name}' as its own source")]
    SelfReference { name: String },

    /// A meta-target expansion came back to a target already being expanded.
    #[error("Target cycle detected: {chain}")]
    TargetCycle { chain: String },

    /// A meta-target resolved to zero targets for a single-target operation.
    #[error("Target '{name}' does not resolve to any target")]
    NoTargets { name: String },

    /// No registered plugin handles the target type for this operation.
    #[error("No plugin for target type '{kind}' supports {operation}")]
    NoPlugin { kind: String, operation: String },

    /// The plugin does not implement the operation.
    #[error("Plugin '{plugin}' does not implement {operation}")]
    NotImplemented { plugin: String, operation: String },

    /// A target is missing or has malformed settings.
    #[error("Invalid target '{name}': {message}")]
    InvalidTarget { name: String, message: String },

    /// A remote file operation failed.
    #[error("Transfer of '{path}' failed: {source}")]
    Transfer {
        path: String,
        #[source]
        source: ClientError,
    },

    /// Opening a connection for a target failed.
    #[error("Could not connect to target '{target}': {message}")]
    Connection { target: String, message: String },

    /// Local I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A prompt answer was rejected.
    #[error("Invalid input for '{prompt}': {message}")]
    Prompt { prompt: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Archive creation failed.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl DeployError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a "not implemented" error for a plugin operation.
    pub fn not_implemented(plugin: impl Into<String>, operation: impl ToString) -> Self {
        Self::NotImplemented {
            plugin: plugin.into(),
            operation: operation.to_string(),
        }
    }

    /// Create an invalid target error.
    pub fn invalid_target(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error was raised while resolving targets, before any I/O.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. }
                | Self::SelfReference { .. }
                | Self::TargetCycle { .. }
                | Self::NoTargets { .. }
                | Self::NoPlugin { .. }
        )
    }
}

/// Errors reported by remote file clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Remote path not found.
    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// Permission denied for a remote path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Path escapes the client root or is otherwise malformed.
    #[error("Invalid remote path: {path}")]
    InvalidPath { path: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection was lost or refused.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ClientError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
