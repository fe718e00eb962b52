//! The plugin contract.

use shipwright_core::{
    BoxFuture, DeployError, DeployResult, FileToDelete, FileToDownload, FileToUpload, PathMapping,
    Target, apply_mappings,
};
use tokio_util::sync::CancellationToken;

use crate::capability::{Capabilities, Operation};
use crate::context::{DirectoryListing, ExpansionTrail, FilesContext, ListContext};
use crate::workspace::Workspace;

/// Trait that every backend (leaf or meta) implements.
///
/// Implementations override only the operations they advertise in
/// [`Plugin::capabilities`]; the defaults return
/// [`DeployError::NotImplemented`].
///
/// File operations must attempt every file of the batch, reporting per-file
/// failures through the file's `completed` callback. Once the context's
/// cancellation token fires, untried files are skipped without callbacks.
pub trait Plugin: Send + Sync {
    /// Target type this plugin handles (e.g. "local", "batch").
    fn kind(&self) -> &str;

    /// Operations this plugin supports.
    fn capabilities(&self) -> Capabilities;

    /// Delete files from the context's target.
    fn delete_files<'a>(
        &'a self,
        _ctx: FilesContext<'a, FileToDelete>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        let err = DeployError::not_implemented(self.kind(), Operation::Delete);
        Box::pin(async move { Err(err) })
    }

    /// Pull files from the context's target.
    fn download_files<'a>(
        &'a self,
        _ctx: FilesContext<'a, FileToDownload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        let err = DeployError::not_implemented(self.kind(), Operation::Download);
        Box::pin(async move { Err(err) })
    }

    /// Deploy files to the context's target.
    fn upload_files<'a>(
        &'a self,
        _ctx: FilesContext<'a, FileToUpload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        let err = DeployError::not_implemented(self.kind(), Operation::Upload);
        Box::pin(async move { Err(err) })
    }

    /// List a directory of the context's target.
    fn list_directory<'a>(
        &'a self,
        _ctx: ListContext<'a>,
    ) -> BoxFuture<'a, DeployResult<DirectoryListing>> {
        let err = DeployError::not_implemented(self.kind(), Operation::List);
        Box::pin(async move { Err(err) })
    }

    /// Release resources at teardown.
    fn dispose(&self) {}
}

/// A file kind that travels through one of the file operations.
pub trait OperationFile: Clone + Send + Sync + 'static {
    /// The operation this file kind belongs to.
    const OPERATION: Operation;

    /// Copy with the target's path mappings applied.
    fn remap(&self, mappings: &[PathMapping]) -> DeployResult<Self>;

    /// Call the matching plugin method.
    fn dispatch<'a>(
        plugin: &'a dyn Plugin,
        ctx: FilesContext<'a, Self>,
    ) -> BoxFuture<'a, DeployResult<()>>;
}

impl OperationFile for FileToDelete {
    const OPERATION: Operation = Operation::Delete;

    fn remap(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        self.remapped(mappings)
    }

    fn dispatch<'a>(
        plugin: &'a dyn Plugin,
        ctx: FilesContext<'a, Self>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        plugin.delete_files(ctx)
    }
}

impl OperationFile for FileToDownload {
    const OPERATION: Operation = Operation::Download;

    fn remap(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        self.remapped(mappings)
    }

    fn dispatch<'a>(
        plugin: &'a dyn Plugin,
        ctx: FilesContext<'a, Self>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        plugin.download_files(ctx)
    }
}

impl OperationFile for FileToUpload {
    const OPERATION: Operation = Operation::Upload;

    fn remap(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        self.remapped(mappings)
    }

    fn dispatch<'a>(
        plugin: &'a dyn Plugin,
        ctx: FilesContext<'a, Self>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        plugin.upload_files(ctx)
    }
}

/// Run one plugin against one target.
///
/// Files are remapped through the target's path mappings; callbacks on the
/// remapped copies reach the caller's descriptors.
pub async fn invoke_files<F: OperationFile>(
    plugin: &dyn Plugin,
    target: &Target,
    files: &[F],
    workspace: &Workspace,
    cancel: &CancellationToken,
    trail: &ExpansionTrail,
) -> DeployResult<()> {
    if !plugin.capabilities().supports(F::OPERATION) {
        return Err(DeployError::not_implemented(plugin.kind(), F::OPERATION));
    }

    let files = files
        .iter()
        .map(|file| file.remap(&target.mappings))
        .collect::<DeployResult<Vec<_>>>()?;

    tracing::debug!(
        target: "dispatch",
        plugin = plugin.kind(),
        target_name = %target.display_name(),
        operation = %F::OPERATION,
        files = files.len(),
        "invoking plugin"
    );

    let ctx = FilesContext {
        target,
        files,
        workspace,
        cancel: cancel.clone(),
        trail: trail.clone(),
    };
    F::dispatch(plugin, ctx).await
}

/// List `dir` on one target through one plugin, applying the target's mappings.
pub async fn invoke_list(
    plugin: &dyn Plugin,
    target: &Target,
    dir: &str,
    workspace: &Workspace,
    cancel: &CancellationToken,
    trail: &ExpansionTrail,
) -> DeployResult<DirectoryListing> {
    if !plugin.capabilities().can_list() {
        return Err(DeployError::not_implemented(plugin.kind(), Operation::List));
    }

    let ctx = ListContext {
        target,
        dir: apply_mappings(dir, &target.mappings)?,
        workspace,
        cancel: cancel.clone(),
        trail: trail.clone(),
    };
    plugin.list_directory(ctx).await
}
