//! Plugin dispatch and target resolution engine for shipwright.
//!
//! This crate provides the trait-based plugin architecture that lets any
//! operation (delete, download, list, upload) run against any configured
//! target.
//!
//! # Architecture
//!
//! - [`Plugin`] is the polymorphic contract every backend implements.
//! - [`AsyncFileClientPlugin`] adapts any [`AsyncFileClient`] (one connection
//!   per batch, always disposed) into a plugin.
//! - [`IterablePlugin`] turns a [`TargetExpander`] into a meta-target plugin
//!   that resolves other targets by name, clones or rewrites them, and fans
//!   the operation out to their plugins.
//! - [`Workspace`] bundles the configured targets, the [`PluginRegistry`],
//!   placeholder values, the prompter and switch state.
//!
//! # Example
//!
//! ```ignore
//! use shipwright_plugin::{PluginContext, PluginRegistry, Workspace};
//!
//! let registry = PluginRegistry::with_builtin(PluginContext::default());
//! let workspace = Workspace::from_config(config, root, registry.into());
//! let target = workspace.find_target("production").unwrap();
//! ```

pub mod backends;
mod capability;
mod client;
mod context;
mod iterable;
pub mod meta;
mod plugin;
mod registry;
mod resolver;
mod workspace;

pub use capability::{Capabilities, Operation};
pub use client::{
    AsyncFileClient, AsyncFileClientPlugin, ClientFactory, ConnectionContext, FileSystemInfo,
    FileSystemKind,
};
pub use context::{DirectoryListing, ExpansionTrail, FilesContext, ListContext, PluginContext};
pub use iterable::{IterablePlugin, TargetExpander};
pub use meta::prompt::{DismissPrompter, PromptRequest, PromptValueType, Prompter};
pub use plugin::{OperationFile, Plugin, invoke_files, invoke_list};
pub use registry::PluginRegistry;
pub use resolver::get_targets_by_name;
pub use workspace::{SwitchStates, Workspace};

pub use shipwright_core::BoxFuture;
