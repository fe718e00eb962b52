//! Contexts handed to plugins.

use shipwright_core::{DeployError, DeployResult, Target, normalize_name};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{FileSystemInfo, FileSystemKind};
use crate::workspace::Workspace;

/// Context a plugin instance is bound to for its lifetime.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    output: Option<mpsc::UnboundedSender<String>>,
}

impl PluginContext {
    /// Create a context without an output channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send human-readable plugin output to `tx`.
    pub fn with_output(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.output = Some(tx);
        self
    }

    /// Write a line to the output channel (and the log).
    pub fn output(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "plugin_output", "{}", line);
        if let Some(tx) = &self.output {
            // Receiver gone means nobody is listening anymore.
            let _ = tx.send(line);
        }
    }
}

/// Names of the meta-targets currently being expanded, outermost first.
///
/// Carried through recursive dispatch so a target that (directly or through
/// other meta-targets) refers back to itself is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionTrail(Vec<String>);

impl ExpansionTrail {
    /// Whether a target with this name is already being expanded.
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.0.iter().any(|n| normalize_name(n) == name)
    }

    /// Extend the trail with `target`, failing if it is already on it.
    pub fn enter(&self, target: &Target) -> DeployResult<Self> {
        let name = target.display_name();
        if self.contains(&name) {
            return Err(self.cycle_error(&name));
        }
        let mut names = self.0.clone();
        names.push(name);
        Ok(Self(names))
    }

    /// Error describing the cycle closed by `name`.
    pub fn cycle_error(&self, name: &str) -> DeployError {
        let mut chain = self.0.clone();
        chain.push(name.to_string());
        DeployError::TargetCycle {
            chain: chain.join(" -> "),
        }
    }

    /// Number of enclosing meta-targets.
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// Context for delete, download and upload operations.
pub struct FilesContext<'a, F> {
    /// Target the files go to (or come from).
    pub target: &'a Target,
    /// Files in the batch, in order.
    pub files: Vec<F>,
    /// Owning workspace (targets, registry, values).
    pub workspace: &'a Workspace,
    /// Shared cancellation token of the whole operation.
    pub cancel: CancellationToken,
    /// Meta-targets already being expanded.
    pub trail: ExpansionTrail,
}

impl<'a, F> FilesContext<'a, F> {
    /// Create a top-level context.
    pub fn new(
        target: &'a Target,
        files: Vec<F>,
        workspace: &'a Workspace,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            files,
            workspace,
            cancel,
            trail: ExpansionTrail::default(),
        }
    }

    /// Whether the caller asked to stop.
    pub fn is_cancelling(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Context for listing a remote directory.
pub struct ListContext<'a> {
    /// Target to list.
    pub target: &'a Target,
    /// Remote-relative directory.
    pub dir: String,
    /// Owning workspace.
    pub workspace: &'a Workspace,
    /// Shared cancellation token of the whole operation.
    pub cancel: CancellationToken,
    /// Meta-targets already being expanded.
    pub trail: ExpansionTrail,
}

impl<'a> ListContext<'a> {
    /// Create a top-level context.
    pub fn new(
        target: &'a Target,
        dir: impl Into<String>,
        workspace: &'a Workspace,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            dir: dir.into(),
            workspace,
            cancel,
            trail: ExpansionTrail::default(),
        }
    }

    /// Whether the caller asked to stop.
    pub fn is_cancelling(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Result of listing a directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    pub dirs: Vec<FileSystemInfo>,
    pub files: Vec<FileSystemInfo>,
    /// Entries of any other (or unknown) type.
    pub others: Vec<FileSystemInfo>,
}

impl DirectoryListing {
    /// Sort a flat entry list into directories, files and everything else.
    pub fn from_entries(entries: Vec<FileSystemInfo>) -> Self {
        let mut listing = Self::default();
        for entry in entries {
            match entry.kind {
                FileSystemKind::Directory => listing.dirs.push(entry),
                FileSystemKind::File => listing.files.push(entry),
                FileSystemKind::Unknown => listing.others.push(entry),
            }
        }
        listing
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len() + self.others.len()
    }

    /// Whether the listing has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
