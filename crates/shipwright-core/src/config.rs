//! Workspace configuration file (`shipwright.toml` or `.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};
use crate::target::{Target, normalize_name};
use crate::values::Values;

/// Contents of a workspace configuration file.
///
/// ```toml
/// name = "site"
/// package = "web"
/// exclude = ["*.log"]
///
/// [values]
/// stage = "prod"
///
/// [[targets]]
/// name = "Local build"
/// type = "local"
/// dir = "out/${stage}"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace name (used for archive names).
    #[serde(default)]
    pub name: Option<String>,

    /// Package whose `hide_if`/`show_if` filters apply.
    #[serde(default)]
    pub package: Option<String>,

    /// Placeholder values.
    #[serde(default)]
    pub values: Values,

    /// Glob patterns of local files never deployed (`*.log`, `node_modules`).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Configured targets, in order.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl WorkspaceConfig {
    /// Load a config file, choosing the format by extension (`.json` or TOML).
    pub fn load(path: &Path) -> DeployResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse TOML content.
    pub fn from_toml_str(content: &str) -> DeployResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| DeployError::config(e.to_string()))?;
        config.finish()
    }

    /// Parse JSON content.
    pub fn from_json_str(content: &str) -> DeployResult<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| DeployError::config(e.to_string()))?;
        config.finish()
    }

    fn finish(mut self) -> DeployResult<Self> {
        for (index, target) in self.targets.iter_mut().enumerate() {
            target.index = index;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every target has a type.
    pub fn validate(&self) -> DeployResult<()> {
        if let Some(target) = self.targets.iter().find(|t| normalize_name(&t.kind).is_empty()) {
            return Err(DeployError::invalid_target(
                target.display_name(),
                "missing target type",
            ));
        }
        Ok(())
    }
}
