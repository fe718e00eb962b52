//! `map`: clone targets once per settings object.
//!
//! `from` is either a list of objects or the path of a JSON file (relative
//! to the workspace root) containing such a list. Every object is merged on
//! top of a copy of every listed target.

use serde_json::Value;
use shipwright_core::{BoxFuture, DeployError, DeployResult, Settings, Target};

use super::{clone_with_each, placeholders};
use crate::capability::Operation;
use crate::iterable::TargetExpander;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, Default)]
pub struct MapExpander;

impl MapExpander {
    async fn load_from(base: &Target, workspace: &Workspace) -> DeployResult<Vec<Value>> {
        match base.setting("from") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(Value::Object(object)) => Ok(vec![Value::Object(object.clone())]),
            Some(Value::String(path)) => {
                let path = workspace.resolve_dir(path);
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| DeployError::io(&path, e))?;
                match serde_json::from_str(&content) {
                    Ok(Value::Array(items)) => Ok(items),
                    Ok(Value::Object(object)) => Ok(vec![Value::Object(object)]),
                    Ok(_) => Err(DeployError::invalid_target(
                        base.display_name(),
                        format!("{} does not contain a list of objects", path.display()),
                    )),
                    Err(e) => Err(DeployError::invalid_target(
                        base.display_name(),
                        format!("{}: {e}", path.display()),
                    )),
                }
            }
            Some(other) => Err(DeployError::invalid_target(
                base.display_name(),
                format!("unsupported 'from' value: {other}"),
            )),
        }
    }

    async fn overrides(base: &Target, workspace: &Workspace) -> DeployResult<Vec<Settings>> {
        Self::load_from(base, workspace)
            .await?
            .iter()
            .map(|item| match placeholders(base, workspace, item) {
                Value::Object(settings) => Ok(settings),
                other => Err(DeployError::invalid_target(
                    base.display_name(),
                    format!("'from' entries must be objects, got {other}"),
                )),
            })
            .collect()
    }
}

impl TargetExpander for MapExpander {
    fn kind(&self) -> &'static str {
        "map"
    }

    fn prepare_targets_many<'a>(
        &'a self,
        base: &'a Target,
        targets: Vec<Target>,
        _operation: Operation,
        workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<Vec<Target>>> {
        Box::pin(async move {
            let overrides = Self::overrides(base, workspace).await?;
            Ok(clone_with_each(&targets, &overrides))
        })
    }
}
