//! Meta-target expansion.
//!
//! A meta-target does no I/O itself. Its type selects a [`TargetExpander`]
//! that turns the target into a list of concrete targets, and
//! [`IterablePlugin`] fans the operation out to their plugins:
//!
//! 1. [`TargetExpander::prepare_base_target`] may rewrite the meta-target or
//!    abort the whole operation (a dismissed prompt).
//! 2. The names from [`TargetExpander::target_names`] are resolved against
//!    the workspace, all or nothing. A target listing itself, or a target
//!    already being expanded further up, is rejected.
//! 3. [`TargetExpander::prepare_targets_many`] may clone or replace the
//!    resolved list.
//! 4. Every target, and every plugin registered for its type, is invoked in
//!    order, with [`TargetExpander::prepare_target`] as a last per-branch
//!    rewrite. Download and list only use the first target and plugin.

use std::sync::Arc;

use shipwright_core::{
    BoxFuture, DeployError, DeployResult, FileToDelete, FileToDownload, FileToUpload, Target,
};
use tokio_util::sync::CancellationToken;

use crate::capability::{Capabilities, Operation};
use crate::context::{DirectoryListing, ExpansionTrail, FilesContext, ListContext, PluginContext};
use crate::plugin::{OperationFile, Plugin, invoke_files, invoke_list};
use crate::workspace::Workspace;

/// Expansion rules of one meta-target type.
pub trait TargetExpander: Send + Sync + 'static {
    /// Target type handled.
    fn kind(&self) -> &'static str;

    /// Rewrite the meta-target before expansion. `None` aborts the operation
    /// without error.
    fn prepare_base_target<'a>(
        &'a self,
        target: &'a Target,
        _workspace: &'a Workspace,
        _operation: Operation,
    ) -> BoxFuture<'a, DeployResult<Option<Target>>> {
        Box::pin(async move { Ok(Some(target.clone())) })
    }

    /// Names of the targets to expand to. Reads the `targets` setting by default.
    fn target_names(&self, base: &Target, _workspace: &Workspace) -> DeployResult<Vec<String>> {
        Ok(base.string_list("targets"))
    }

    /// Rewrite or multiply the resolved targets.
    fn prepare_targets_many<'a>(
        &'a self,
        _base: &'a Target,
        targets: Vec<Target>,
        _operation: Operation,
        _workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<Vec<Target>>> {
        Box::pin(async move { Ok(targets) })
    }

    /// Rewrite one target right before it is handed to a plugin. `None`
    /// skips only this branch.
    fn prepare_target(
        &self,
        _base: &Target,
        target: Target,
        _operation: Operation,
    ) -> Option<Target> {
        Some(target)
    }
}

/// Plugin that dispatches through a [`TargetExpander`].
pub struct IterablePlugin<E> {
    expander: E,
    context: PluginContext,
}

impl<E: TargetExpander> IterablePlugin<E> {
    pub fn new(expander: E, context: PluginContext) -> Self {
        Self { expander, context }
    }

    pub fn expander(&self) -> &E {
        &self.expander
    }

    /// Resolve and prepare the targets of `base`.
    ///
    /// `trail` must already contain `base`.
    pub async fn get_targets(
        &self,
        base: &Target,
        operation: Operation,
        workspace: &Workspace,
        trail: &ExpansionTrail,
    ) -> DeployResult<Vec<Target>> {
        let names = self.expander.target_names(base, workspace)?;
        let resolved = workspace.targets_by_name(&names)?;

        let own = base.normalized_name();
        if resolved.iter().any(|t| t.normalized_name() == own) {
            return Err(DeployError::SelfReference {
                name: base.display_name(),
            });
        }
        if let Some(seen) = resolved.iter().find(|t| trail.contains(&t.display_name())) {
            return Err(trail.cycle_error(&seen.display_name()));
        }

        let targets = self
            .expander
            .prepare_targets_many(base, resolved, operation, workspace)
            .await?;

        tracing::debug!(
            target: "expand",
            kind = self.expander.kind(),
            meta = %base.display_name(),
            resolved = ?targets.iter().map(Target::display_name).collect::<Vec<_>>(),
            "expanded meta-target"
        );
        Ok(targets)
    }

    /// First target of `base`, for operations that read from one source.
    pub async fn get_first_target(
        &self,
        base: &Target,
        operation: Operation,
        workspace: &Workspace,
        trail: &ExpansionTrail,
    ) -> DeployResult<Target> {
        self.get_targets(base, operation, workspace, trail)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::NoTargets {
                name: base.display_name(),
            })
    }

    /// Fully expand `target` one level, as a dispatch would, without invoking
    /// any plugin. Returns an empty list when the expansion is aborted.
    pub async fn resolve(
        &self,
        target: &Target,
        operation: Operation,
        workspace: &Workspace,
    ) -> DeployResult<Vec<Target>> {
        let trail = ExpansionTrail::default().enter(target)?;
        let Some(base) = self
            .expander
            .prepare_base_target(target, workspace, operation)
            .await?
        else {
            return Ok(Vec::new());
        };

        let targets = self.get_targets(&base, operation, workspace, &trail).await?;
        Ok(targets
            .into_iter()
            .filter_map(|t| self.expander.prepare_target(&base, t, operation))
            .collect())
    }

    async fn base_target(
        &self,
        target: &Target,
        workspace: &Workspace,
        operation: Operation,
    ) -> DeployResult<Option<Target>> {
        let base = self
            .expander
            .prepare_base_target(target, workspace, operation)
            .await?;
        if base.is_none() {
            tracing::info!(
                target: "expand",
                kind = self.expander.kind(),
                meta = %target.display_name(),
                "operation aborted while preparing target"
            );
            self.context
                .output(format!("[{}] {} aborted", self.expander.kind(), target.display_name()));
        }
        Ok(base)
    }

    async fn fan_out<F: OperationFile>(&self, ctx: FilesContext<'_, F>) -> DeployResult<()> {
        let FilesContext {
            target,
            files,
            workspace,
            cancel,
            trail,
        } = ctx;
        let operation = F::OPERATION;

        let trail = trail.enter(target)?;
        let Some(base) = self.base_target(target, workspace, operation).await? else {
            return Ok(());
        };

        let mut targets = self.get_targets(&base, operation, workspace, &trail).await?;
        if operation.is_single_target() {
            targets.truncate(1);
            if targets.is_empty() {
                return Err(DeployError::NoTargets {
                    name: base.display_name(),
                });
            }
        }

        // Resolve every plugin up front so lookup failures abort before any I/O.
        let plan = targets
            .into_iter()
            .map(|t| {
                let mut plugins = workspace.plugins_for(&t, operation)?;
                if operation.is_single_target() {
                    plugins.truncate(1);
                }
                Ok((t, plugins))
            })
            .collect::<DeployResult<Vec<(Target, Vec<Arc<dyn Plugin>>)>>>()?;

        for (sub_target, plugins) in plan {
            if is_cancelled(&cancel, &sub_target) {
                break;
            }

            for plugin in plugins {
                if is_cancelled(&cancel, &sub_target) {
                    break;
                }

                let Some(prepared) =
                    self.expander
                        .prepare_target(&base, sub_target.clone(), operation)
                else {
                    continue;
                };

                invoke_files(plugin.as_ref(), &prepared, &files, workspace, &cancel, &trail).await?;
            }
        }

        Ok(())
    }

    async fn list(&self, ctx: ListContext<'_>) -> DeployResult<DirectoryListing> {
        let ListContext {
            target,
            dir,
            workspace,
            cancel,
            trail,
        } = ctx;

        let trail = trail.enter(target)?;
        let Some(base) = self.base_target(target, workspace, Operation::List).await? else {
            return Ok(DirectoryListing::default());
        };

        let first = self
            .get_first_target(&base, Operation::List, workspace, &trail)
            .await?;
        let plugin = workspace
            .plugins_for(&first, Operation::List)?
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::NoPlugin {
                kind: first.kind.clone(),
                operation: Operation::List.to_string(),
            })?;

        if is_cancelled(&cancel, &first) {
            return Ok(DirectoryListing::default());
        }
        let Some(prepared) = self.expander.prepare_target(&base, first, Operation::List) else {
            return Ok(DirectoryListing::default());
        };

        invoke_list(plugin.as_ref(), &prepared, &dir, workspace, &cancel, &trail).await
    }
}

fn is_cancelled(cancel: &CancellationToken, next: &Target) -> bool {
    let cancelled = cancel.is_cancelled();
    if cancelled {
        tracing::debug!(
            target: "expand",
            next = %next.display_name(),
            "cancelled, stopping fan-out"
        );
    }
    cancelled
}

impl<E: TargetExpander> Plugin for IterablePlugin<E> {
    fn kind(&self) -> &str {
        self.expander.kind()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn delete_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToDelete>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(self.fan_out(ctx))
    }

    fn download_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToDownload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(self.fan_out(ctx))
    }

    fn upload_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToUpload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(self.fan_out(ctx))
    }

    fn list_directory<'a>(
        &'a self,
        ctx: ListContext<'a>,
    ) -> BoxFuture<'a, DeployResult<DirectoryListing>> {
        Box::pin(self.list(ctx))
    }
}
