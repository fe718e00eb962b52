//! `each`: clone targets once per value.
//!
//! ```toml
//! [[targets]]
//! name = "Every locale"
//! type = "each"
//! targets = ["Site"]
//! from = ["en", "de"]
//! to = "dir"
//! ```
//!
//! produces two copies of `Site`, the first with `dir = "en"`, the second
//! with `dir = "de"`. `to` may list several properties; each of them gets the
//! value. With several targets, all clones of the first target come first.

use serde_json::Value;
use shipwright_core::{BoxFuture, DeployError, DeployResult, Settings, Target};

use super::{clone_with_each, placeholders};
use crate::capability::Operation;
use crate::iterable::TargetExpander;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, Default)]
pub struct EachExpander;

impl EachExpander {
    fn overrides(base: &Target, workspace: &Workspace) -> DeployResult<Vec<Settings>> {
        let properties = base.string_list("to");
        if properties.is_empty() {
            return Err(DeployError::invalid_target(
                base.display_name(),
                "'to' must name at least one property",
            ));
        }

        let values = match base.setting("from") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        Ok(values
            .iter()
            .map(|value| {
                let value = placeholders(base, workspace, value);
                properties
                    .iter()
                    .map(|property| (property.clone(), value.clone()))
                    .collect()
            })
            .collect())
    }
}

impl TargetExpander for EachExpander {
    fn kind(&self) -> &'static str {
        "each"
    }

    fn prepare_targets_many<'a>(
        &'a self,
        base: &'a Target,
        targets: Vec<Target>,
        _operation: Operation,
        workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<Vec<Target>>> {
        Box::pin(async move {
            let overrides = Self::overrides(base, workspace)?;
            Ok(clone_with_each(&targets, &overrides))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PluginContext;
    use crate::iterable::IterablePlugin;
    use crate::meta::testing::workspace;

    const TARGETS: &str = r#"
        [values]
        region = "eu"

        [[targets]]
        name = "Locales"
        type = "each"
        targets = ["Site"]
        from = ["a", "b"]
        to = "dir"

        [[targets]]
        name = "Site"
        type = "local"
        dir = "${locale}"

        [[targets]]
        name = "Docs"
        type = "local"

        [[targets]]
        name = "Regions"
        type = "each"
        targets = ["Site", "Docs"]
        from = ["${region}-1", "${region}-2"]
        to = ["dir", "bucket"]
        use_placeholders = true
    "#;

    #[tokio::test]
    async fn test_each_value_becomes_a_clone() {
        let ws = workspace(TARGETS);
        let plugin = IterablePlugin::new(EachExpander, PluginContext::default());
        let locales = ws.find_target("locales").unwrap();

        let targets = plugin.resolve(locales, Operation::Upload, &ws).await.unwrap();
        let dirs: Vec<_> = targets.iter().map(|t| t.str_setting("dir").unwrap()).collect();
        assert_eq!(dirs, ["a", "b"]);
        assert!(targets.iter().all(|t| t.display_name() == "Site"));

        // The configured target is not touched.
        assert_eq!(ws.find_target("site").unwrap().str_setting("dir"), Some("${locale}"));
    }

    #[tokio::test]
    async fn test_target_major_order_with_placeholders() {
        let ws = workspace(TARGETS);
        let plugin = IterablePlugin::new(EachExpander, PluginContext::default());
        let regions = ws.find_target("regions").unwrap();

        let targets = plugin.resolve(regions, Operation::Upload, &ws).await.unwrap();
        let got: Vec<_> = targets
            .iter()
            .map(|t| {
                (
                    t.display_name(),
                    t.str_setting("dir").unwrap().to_string(),
                    t.str_setting("bucket").unwrap().to_string(),
                )
            })
            .collect();

        assert_eq!(
            got,
            [
                ("Site".to_string(), "eu-1".to_string(), "eu-1".to_string()),
                ("Site".to_string(), "eu-2".to_string(), "eu-2".to_string()),
                ("Docs".to_string(), "eu-1".to_string(), "eu-1".to_string()),
                ("Docs".to_string(), "eu-2".to_string(), "eu-2".to_string()),
            ]
        );
    }
}
