//! Connection-backed plugins.
//!
//! [`AsyncFileClient`] is the narrow remote I/O contract a network backend
//! (SFTP, S3, blob storage, ...) implements. [`AsyncFileClientPlugin`] wraps a
//! [`ClientFactory`] into a full [`Plugin`]: it opens one connection per batch,
//! walks the files sequentially with isolated per-file error handling, and
//! always disposes the connection afterwards.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use shipwright_core::{
    BoxFuture, ClientResult, DeployError, DeployResult, FileDescriptor, FileToDelete,
    FileToDownload, FileToUpload, Target, join_remote,
};
use tokio_util::sync::CancellationToken;

use crate::capability::{Capabilities, Operation};
use crate::context::{DirectoryListing, FilesContext, ListContext, PluginContext};
use crate::plugin::Plugin;
use crate::workspace::Workspace;

/// Type of a remote file system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSystemKind {
    #[serde(alias = "dir")]
    Directory,
    File,
    /// Anything else (links, devices, types added by newer backends).
    #[serde(other)]
    Unknown,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    /// Entry name.
    pub name: String,
    /// Remote path of the entry.
    #[serde(default)]
    pub path: String,
    /// Entry type.
    #[serde(rename = "type")]
    pub kind: FileSystemKind,
    /// Size in bytes, if known.
    #[serde(default)]
    pub size: Option<u64>,
    /// Last modification time, if known.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemInfo {
    /// Create an entry with only a name and type.
    pub fn new(name: impl Into<String>, kind: FileSystemKind) -> Self {
        Self {
            name: name.into(),
            path: String::new(),
            kind,
            size: None,
            modified: None,
        }
    }

    /// Set the remote path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Remote I/O contract for connection-based backends.
pub trait AsyncFileClient: Send + Sync {
    /// Write `data` to `path`, creating parent directories as needed.
    fn upload_file<'a>(&'a self, path: &'a str, data: Vec<u8>) -> BoxFuture<'a, ClientResult<()>>;

    /// Read the full content of `path`.
    fn download_file<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<Vec<u8>>>;

    /// Remove `path`.
    fn delete_file<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<()>>;

    /// List the entries of a directory.
    fn list_directory<'a>(&'a self, path: &'a str)
    -> BoxFuture<'a, ClientResult<Vec<FileSystemInfo>>>;

    /// Close the connection.
    fn dispose(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// An open connection for one batch operation.
pub struct ConnectionContext {
    /// The connected client.
    pub client: Box<dyn AsyncFileClient>,
    /// Target the connection was opened for.
    pub target: Target,
    root: String,
}

impl ConnectionContext {
    /// Wrap a connected client. `root` is the remote base directory.
    pub fn new(client: Box<dyn AsyncFileClient>, target: Target, root: impl Into<String>) -> Self {
        Self {
            client,
            target,
            root: root.into(),
        }
    }

    /// Remote base directory.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Remote directory for a remote-relative sub directory.
    pub fn get_dir(&self, sub_dir: &str) -> String {
        join_remote(&[&self.root, sub_dir])
    }

    /// Full remote path of a file: `get_dir(file.path) + "/" + file.name`.
    pub fn remote_path(&self, file: &FileDescriptor) -> String {
        join_remote(&[&self.get_dir(file.path()), file.name()])
    }
}

/// Disposes a connection's client exactly once.
///
/// Dropped while still armed, it spawns the disposal onto the current tokio
/// runtime, if there is one.
struct DisposeGuard {
    conn: Option<Arc<ConnectionContext>>,
}

impl DisposeGuard {
    fn new(conn: Arc<ConnectionContext>) -> Self {
        Self { conn: Some(conn) }
    }

    async fn dispose(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.client.dispose().await;
        }
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(
                    target: "connection",
                    "operation dropped, disposing in background"
                );
                handle.spawn(async move { conn.client.dispose().await });
            }
            Err(_) => {
                tracing::warn!(
                    target: "connection",
                    "operation dropped outside a runtime, client not disposed"
                );
            }
        }
    }
}

/// Builds connections for a connection-based plugin.
pub trait ClientFactory: Send + Sync + 'static {
    /// Target type handled.
    fn kind(&self) -> &str;

    /// Supported operations.
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Open a connection for `target`. Called once per batch.
    fn create_context<'a>(
        &'a self,
        target: &'a Target,
        workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<ConnectionContext>>;

    /// Hook run on the open connection before an upload batch.
    fn prepare_upload<'a>(
        &'a self,
        _conn: &'a ConnectionContext,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Plugin adapter around a [`ClientFactory`].
pub struct AsyncFileClientPlugin<F> {
    factory: F,
    context: PluginContext,
}

impl<F: ClientFactory> AsyncFileClientPlugin<F> {
    /// Create the adapter.
    pub fn new(factory: F, context: PluginContext) -> Self {
        Self { factory, context }
    }

    /// The wrapped factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Open a connection, run `action`, then dispose the client whatever the
    /// outcome of `action`.
    ///
    /// A panic inside `action` is re-raised after the client is disposed. If
    /// the returned future is dropped before completion, disposal is spawned
    /// onto the current runtime.
    pub async fn invoke_for_connection<T, A, Fut>(
        &self,
        target: &Target,
        workspace: &Workspace,
        action: A,
    ) -> DeployResult<T>
    where
        A: FnOnce(Arc<ConnectionContext>) -> Fut,
        Fut: Future<Output = DeployResult<T>>,
    {
        let conn = Arc::new(self.factory.create_context(target, workspace).await?);
        tracing::debug!(
            target: "connection",
            kind = self.factory.kind(),
            target_name = %target.display_name(),
            root = conn.root(),
            "connection opened"
        );

        let mut guard = DisposeGuard::new(Arc::clone(&conn));
        let outcome = AssertUnwindSafe(action(conn)).catch_unwind().await;

        guard.dispose().await;
        tracing::debug!(target: "connection", kind = self.factory.kind(), "connection disposed");

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    fn ensure(&self, operation: Operation) -> DeployResult<()> {
        if self.factory.capabilities().supports(operation) {
            Ok(())
        } else {
            Err(DeployError::not_implemented(self.factory.kind(), operation))
        }
    }

    async fn delete_with(
        &self,
        conn: &ConnectionContext,
        files: Vec<FileToDelete>,
        cancel: &CancellationToken,
    ) {
        for file in files {
            if cancel.is_cancelled() {
                tracing::debug!(target: "connection", "delete cancelled, skipping remaining files");
                break;
            }

            let remote = conn.remote_path(&file);
            file.notify_before(Some(&remote));

            match conn.client.delete_file(&remote).await {
                Ok(()) => file.notify_completed(Ok(None)),
                Err(source) => self.report_failure(&file, remote, source),
            }
        }
    }

    async fn download_with(
        &self,
        conn: &ConnectionContext,
        files: Vec<FileToDownload>,
        cancel: &CancellationToken,
    ) {
        for file in files {
            if cancel.is_cancelled() {
                tracing::debug!(
                    target: "connection",
                    "download cancelled, skipping remaining files"
                );
                break;
            }

            let remote = conn.remote_path(&file);
            file.notify_before(Some(&remote));

            match conn.client.download_file(&remote).await {
                Ok(data) => file.notify_completed(Ok(Some(data.as_slice()))),
                Err(source) => self.report_failure(&file, remote, source),
            }
        }
    }

    async fn upload_with(
        &self,
        conn: &ConnectionContext,
        files: Vec<FileToUpload>,
        cancel: &CancellationToken,
    ) {
        for file in files {
            if cancel.is_cancelled() {
                tracing::debug!(target: "connection", "upload cancelled, skipping remaining files");
                break;
            }

            let remote = conn.remote_path(&file);
            file.notify_before(Some(&remote));

            let data = match file.read().await {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(target: "connection", file = %file.relative_path(), "{err}");
                    file.notify_completed(Err(&err));
                    continue;
                }
            };

            match conn.client.upload_file(&remote, data).await {
                Ok(()) => file.notify_completed(Ok(None)),
                Err(source) => self.report_failure(&file, remote, source),
            }
        }
    }

    fn report_failure(
        &self,
        file: &FileDescriptor,
        remote: String,
        source: shipwright_core::ClientError,
    ) {
        let err = DeployError::Transfer {
            path: remote,
            source,
        };
        tracing::warn!(target: "connection", kind = self.factory.kind(), "{err}");
        self.context.output(format!("[{}] {err}", self.factory.kind()));
        file.notify_completed(Err(&err));
    }
}

impl<F: ClientFactory> Plugin for AsyncFileClientPlugin<F> {
    fn kind(&self) -> &str {
        self.factory.kind()
    }

    fn capabilities(&self) -> Capabilities {
        self.factory.capabilities()
    }

    fn delete_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToDelete>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(async move {
            self.ensure(Operation::Delete)?;
            let FilesContext {
                target,
                files,
                workspace,
                cancel,
                ..
            } = ctx;

            self.invoke_for_connection(target, workspace, move |conn| async move {
                self.delete_with(&conn, files, &cancel).await;
                Ok(())
            })
            .await
        })
    }

    fn download_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToDownload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(async move {
            self.ensure(Operation::Download)?;
            let FilesContext {
                target,
                files,
                workspace,
                cancel,
                ..
            } = ctx;

            self.invoke_for_connection(target, workspace, move |conn| async move {
                self.download_with(&conn, files, &cancel).await;
                Ok(())
            })
            .await
        })
    }

    fn upload_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToUpload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(async move {
            self.ensure(Operation::Upload)?;
            let FilesContext {
                target,
                files,
                workspace,
                cancel,
                ..
            } = ctx;

            self.invoke_for_connection(target, workspace, move |conn| async move {
                self.factory.prepare_upload(&conn).await?;
                self.upload_with(&conn, files, &cancel).await;
                Ok::<_, DeployError>(())
            })
            .await
        })
    }

    fn list_directory<'a>(
        &'a self,
        ctx: ListContext<'a>,
    ) -> BoxFuture<'a, DeployResult<DirectoryListing>> {
        Box::pin(async move {
            self.ensure(Operation::List)?;
            let ListContext {
                target,
                dir,
                workspace,
                ..
            } = ctx;

            self.invoke_for_connection(target, workspace, move |conn| async move {
                let remote = conn.get_dir(&dir);
                let entries = conn
                    .client
                    .list_directory(&remote)
                    .await
                    .map_err(|source| DeployError::Transfer {
                        path: remote.clone(),
                        source,
                    })?;
                Ok::<_, DeployError>(DirectoryListing::from_entries(entries))
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullClient;

    impl AsyncFileClient for NullClient {
        fn upload_file<'a>(
            &'a self,
            _path: &'a str,
            _data: Vec<u8>,
        ) -> BoxFuture<'a, ClientResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn download_file<'a>(&'a self, _path: &'a str) -> BoxFuture<'a, ClientResult<Vec<u8>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn delete_file<'a>(&'a self, _path: &'a str) -> BoxFuture<'a, ClientResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn list_directory<'a>(
            &'a self,
            _path: &'a str,
        ) -> BoxFuture<'a, ClientResult<Vec<FileSystemInfo>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[test]
    fn test_remote_paths() {
        let conn = ConnectionContext::new(Box::new(NullClient), Target::new("sftp"), "/var/www/");
        assert_eq!(conn.get_dir(""), "/var/www");
        assert_eq!(conn.get_dir("css/"), "/var/www/css");
        assert_eq!(
            conn.remote_path(&FileDescriptor::new("site.css", "css")),
            "/var/www/css/site.css"
        );

        let relative = ConnectionContext::new(Box::new(NullClient), Target::new("local"), "");
        assert_eq!(relative.remote_path(&FileDescriptor::new("a.txt", "")), "a.txt");
    }

    #[test]
    fn test_unknown_kind_deserializes() {
        let info: FileSystemInfo =
            serde_json::from_str(r#"{"name": "x", "type": "socket"}"#).unwrap();
        assert_eq!(info.kind, FileSystemKind::Unknown);

        let info: FileSystemInfo = serde_json::from_str(r#"{"name": "d", "type": "dir"}"#).unwrap();
        assert_eq!(info.kind, FileSystemKind::Directory);
    }
}
