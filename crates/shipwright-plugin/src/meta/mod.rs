//! Built-in meta-target types.
//!
//! | type     | expands to                                                  |
//! |----------|-------------------------------------------------------------|
//! | `batch`  | the targets listed in `targets`                             |
//! | `each`   | one clone per target and value of `from`, written to `to`   |
//! | `map`    | one clone per target and object of `from`, merged on top    |
//! | `switch` | the targets of the currently selected option                |
//! | `prompt` | the listed targets with the user's answers written into them |

pub mod batch;
pub mod each;
pub mod map;
pub mod prompt;
pub mod switch;

use shipwright_core::{Settings, Target};
use serde_json::Value;

use crate::workspace::Workspace;

/// Apply workspace placeholders to a value when `use_placeholders` is set.
pub(crate) fn placeholders(base: &Target, workspace: &Workspace, value: &Value) -> Value {
    if base.bool_setting(&["use_placeholders", "usePlaceholders"], false) {
        workspace.values().replace_in_value(value)
    } else {
        value.clone()
    }
}

/// Clone every target once per override set, target-major.
pub(crate) fn clone_with_each(targets: &[Target], overrides: &[Settings]) -> Vec<Target> {
    targets
        .iter()
        .flat_map(|target| overrides.iter().map(move |o| target.with_overrides(o)))
        .collect()
}
