//! Operation kinds and per-file errors.

use serde::{Deserialize, Serialize};
use shipwright_plugin::Operation;

/// A top-level operation requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployOperation {
    Delete,
    Deploy,
    Pull,
    ListDirectory,
}

impl DeployOperation {
    /// Plugin operation this maps to.
    pub fn operation(self) -> Operation {
        match self {
            Self::Delete => Operation::Delete,
            Self::Deploy => Operation::Upload,
            Self::Pull => Operation::Download,
            Self::ListDirectory => Operation::List,
        }
    }

    /// Past-tense verb for summaries.
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Delete => "Deleted",
            Self::Deploy => "Deployed",
            Self::Pull => "Pulled",
            Self::ListDirectory => "Listed",
        }
    }
}

impl From<Operation> for DeployOperation {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Delete => Self::Delete,
            Operation::Upload => Self::Deploy,
            Operation::Download => Self::Pull,
            Operation::List => Self::ListDirectory,
        }
    }
}

impl std::fmt::Display for DeployOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "Delete"),
            Self::Deploy => write!(f, "Deploy"),
            Self::Pull => write!(f, "Pull"),
            Self::ListDirectory => write!(f, "List directory"),
        }
    }
}

/// A file that failed on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferError {
    /// Remote-relative path of the file.
    pub file: String,
    /// A human-readable error message.
    pub message: String,
}

impl TransferError {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_mapping() {
        assert_eq!(DeployOperation::Deploy.operation(), Operation::Upload);
        assert_eq!(DeployOperation::Pull.operation(), Operation::Download);
        assert!(DeployOperation::ListDirectory.operation().is_single_target());
        assert_eq!(DeployOperation::ListDirectory.to_string(), "List directory");
        assert_eq!(DeployOperation::from(Operation::Upload), DeployOperation::Deploy);
    }
}
