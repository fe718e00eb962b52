//! Core types and traits for shipwright.
//!
//! This crate provides the fundamental data structures shared by the plugin
//! engine and the dispatcher: deployment targets, per-file descriptors with
//! their lifecycle observers, path mappings, placeholder values and the
//! error taxonomy.

use std::future::Future;
use std::pin::Pin;

mod config;
mod error;
mod file;
mod mapping;
mod target;
mod values;

pub use config::WorkspaceConfig;
pub use error::{ClientError, ClientResult, DeployError, DeployResult};
pub use file::{
    BytesSource, ContentSource, DataTransformer, FileDescriptor, FileObserver, FileToDelete,
    FileToDownload, FileToUpload, LocalSource, NoopObserver, TransformContext,
};
pub use mapping::{apply_mappings, join_remote, normalize_remote_path, PathMapping};
pub use target::{normalize_name, value_to_string_list, Settings, Target, TargetBuilder};
pub use values::Values;

/// Type alias for boxed futures returned by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
