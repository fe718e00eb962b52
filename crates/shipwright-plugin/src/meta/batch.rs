//! `batch`: run an operation against a list of named targets.

use crate::iterable::TargetExpander;

/// Expands to the targets named in the `targets` setting, unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchExpander;

impl TargetExpander for BatchExpander {
    fn kind(&self) -> &'static str {
        "batch"
    }
}
