//! Top-level operation loop.

use std::sync::Arc;
use std::time::Instant;

use shipwright_core::{
    DeployError, DeployResult, FileToDelete, FileToDownload, FileToUpload, Target,
};
use shipwright_plugin::{
    DirectoryListing, ExpansionTrail, OperationFile, Plugin, Workspace, invoke_files, invoke_list,
};
use tokio_util::sync::CancellationToken;

use crate::operation::DeployOperation;

/// Runs operations against a workspace.
///
/// Every operation started through one dispatcher shares its cancellation
/// token; cancelling it stops all of them at the next file, plugin or
/// target boundary.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workspace: Arc<Workspace>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Token shared with every plugin invoked by this dispatcher.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation of running operations.
    pub fn cancel(&self) {
        tracing::info!(target: "dispatch", "cancellation requested");
        self.cancel.cancel();
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deploy files to the named targets.
    pub async fn deploy<S: AsRef<str>>(
        &self,
        files: Vec<FileToUpload>,
        targets: &[S],
    ) -> DeployResult<()> {
        let targets = self.workspace.targets_by_name(targets)?;
        self.execute(&files, &targets).await
    }

    /// Delete files from the named targets.
    pub async fn delete<S: AsRef<str>>(
        &self,
        files: Vec<FileToDelete>,
        targets: &[S],
    ) -> DeployResult<()> {
        let targets = self.workspace.targets_by_name(targets)?;
        self.execute(&files, &targets).await
    }

    /// Pull files from one target.
    pub async fn pull(&self, files: Vec<FileToDownload>, target: &str) -> DeployResult<()> {
        let targets = self.workspace.targets_by_name(&[target])?;
        self.execute(&files, &targets).await
    }

    /// List a directory of one target.
    pub async fn list_directory(&self, target: &str, dir: &str) -> DeployResult<DirectoryListing> {
        let target = self
            .workspace
            .targets_by_name(&[target])?
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::NoTargets {
                name: target.to_string(),
            })?;

        let plugin = self.plugins(&target, DeployOperation::ListDirectory)?.remove(0);
        tracing::debug!(
            target: "dispatch",
            target_name = %target.display_name(),
            dir,
            "listing directory"
        );

        invoke_list(
            plugin.as_ref(),
            &target,
            dir,
            &self.workspace,
            &self.cancel,
            &ExpansionTrail::default(),
        )
        .await
    }

    /// Run `files` through every plugin of every target, in order.
    ///
    /// Plugins are looked up for all targets before the first one is
    /// invoked. Pulls only use the first target and its first plugin.
    pub async fn execute<F: OperationFile>(
        &self,
        files: &[F],
        targets: &[Target],
    ) -> DeployResult<()> {
        let operation = DeployOperation::from(F::OPERATION);
        let single = F::OPERATION.is_single_target();
        let targets = if single && !targets.is_empty() {
            &targets[..1]
        } else {
            targets
        };

        let plan = targets
            .iter()
            .map(|target| {
                let mut plugins = self.plugins(target, operation)?;
                if single {
                    plugins.truncate(1);
                }
                Ok((target, plugins))
            })
            .collect::<DeployResult<Vec<(&Target, Vec<Arc<dyn Plugin>>)>>>()?;

        let started = Instant::now();
        tracing::info!(
            target: "dispatch",
            operation = %operation,
            files = files.len(),
            targets = plan.len(),
            "starting operation"
        );

        for (target, plugins) in plan {
            for plugin in plugins {
                if self.is_cancelling() {
                    tracing::info!(
                        target: "dispatch",
                        operation = %operation,
                        "operation cancelled"
                    );
                    return Ok(());
                }

                invoke_files(
                    plugin.as_ref(),
                    target,
                    files,
                    &self.workspace,
                    &self.cancel,
                    &ExpansionTrail::default(),
                )
                .await?;
            }
        }

        tracing::info!(
            target: "dispatch",
            operation = %operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "operation finished"
        );
        Ok(())
    }

    fn plugins(
        &self,
        target: &Target,
        operation: DeployOperation,
    ) -> DeployResult<Vec<Arc<dyn Plugin>>> {
        self.workspace.plugins_for(target, operation.operation())
    }
}
