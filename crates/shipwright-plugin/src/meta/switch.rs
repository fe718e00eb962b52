//! `switch`: expand to the targets of the selected option.
//!
//! ```toml
//! [[targets]]
//! name = "Environment"
//! type = "switch"
//! options = [
//!     { name = "Staging", targets = ["Stage server"], default = true },
//!     { name = "Production", targets = ["Prod 1", "Prod 2"] },
//! ]
//! ```
//!
//! The selection lives in the workspace's [`SwitchStates`]. Without one, the
//! option flagged `default` is used, otherwise the first option.
//!
//! [`SwitchStates`]: crate::SwitchStates

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shipwright_core::{DeployError, DeployResult, Target, normalize_name, value_to_string_list};

use crate::iterable::TargetExpander;
use crate::workspace::Workspace;

/// One selectable option of a switch target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchOption {
    #[serde(default)]
    pub name: Option<String>,

    /// Target names, as a single string or a list.
    #[serde(default)]
    pub targets: Value,

    #[serde(default, alias = "isDefault")]
    pub default: bool,

    #[serde(skip)]
    pub index: usize,
}

impl SwitchOption {
    /// Name shown to users; unnamed options get `(Option #N)`.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("(Option #{})", self.index + 1),
        }
    }

    /// Names of the targets this option expands to.
    pub fn target_names(&self) -> Vec<String> {
        value_to_string_list(&self.targets)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchExpander;

impl SwitchExpander {
    /// Options configured on a switch target, in order.
    pub fn options(target: &Target) -> DeployResult<Vec<SwitchOption>> {
        let Some(raw) = target.setting("options") else {
            return Ok(Vec::new());
        };

        let mut options: Vec<SwitchOption> =
            serde_json::from_value(raw.clone()).map_err(|e| {
                DeployError::invalid_target(target.display_name(), format!("options: {e}"))
            })?;
        for (index, option) in options.iter_mut().enumerate() {
            option.index = index;
        }
        Ok(options)
    }

    /// The option currently in effect for `target`.
    pub fn selected_option(target: &Target, workspace: &Workspace) -> DeployResult<SwitchOption> {
        let options = Self::options(target)?;

        if let Some(selected) = workspace.switches().selected(&target.display_name()) {
            let selected = normalize_name(&selected);
            match options
                .iter()
                .find(|o| normalize_name(&o.display_name()) == selected)
            {
                Some(option) => return Ok(option.clone()),
                None => tracing::warn!(
                    target: "expand",
                    switch = %target.display_name(),
                    option = %selected,
                    "selected option no longer exists, using default"
                ),
            }
        }

        options
            .iter()
            .find(|o| o.default)
            .or_else(|| options.first())
            .cloned()
            .ok_or_else(|| {
                DeployError::invalid_target(target.display_name(), "switch has no options")
            })
    }
}

impl TargetExpander for SwitchExpander {
    fn kind(&self) -> &'static str {
        "switch"
    }

    fn target_names(&self, base: &Target, workspace: &Workspace) -> DeployResult<Vec<String>> {
        let option = Self::selected_option(base, workspace)?;
        tracing::debug!(
            target: "expand",
            switch = %base.display_name(),
            option = %option.display_name(),
            "using switch option"
        );
        Ok(option.target_names())
    }
}
