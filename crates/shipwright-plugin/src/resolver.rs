//! Name-based target lookup.

use shipwright_core::{Target, normalize_name};

/// Resolve `names` against `all`.
///
/// Names are compared trimmed and case-insensitively against each target's
/// display name (unnamed targets answer to `(Target #N)`); blank names are
/// ignored and duplicate names collapse to one. Every target answering to a
/// requested name is selected, grouped in the order the names were first
/// requested and in configured order within a name. Returns `None` when any
/// requested name has no matching target.
pub fn get_targets_by_name<S: AsRef<str>>(
    names: &[S],
    all: &[Target],
) -> Option<Vec<Target>> {
    let mut wanted: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = normalize_name(name.as_ref());
        if !name.is_empty() && !wanted.contains(&name) {
            wanted.push(name);
        }
    }

    let mut found = Vec::new();
    for name in &wanted {
        let before = found.len();
        found.extend(all.iter().filter(|t| t.normalized_name() == *name).cloned());
        if found.len() == before {
            return None;
        }
    }
    Some(found)
}

/// Requested names (normalized, deduplicated) with no matching target.
pub(crate) fn missing_names<S: AsRef<str>>(names: &[S], all: &[Target]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        let normalized = normalize_name(trimmed);
        if normalized.is_empty() || missing.iter().any(|m| normalize_name(m) == normalized) {
            continue;
        }
        if !all.iter().any(|t| t.normalized_name() == normalized) {
            missing.push(trimmed.to_string());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> Target {
        Target::builder().name(name).kind("local").build().unwrap()
    }

    fn names(targets: &[Target]) -> Vec<String> {
        targets.iter().map(Target::display_name).collect()
    }

    #[test]
    fn test_request_order_and_dedup() {
        let all = vec![target("Alpha"), target("Beta"), target("Gamma")];
        let found = get_targets_by_name(&["gamma", " ALPHA ", "alpha", ""], &all).unwrap();
        assert_eq!(names(&found), ["Gamma", "Alpha"]);
    }

    #[test]
    fn test_every_target_sharing_a_name_is_selected() {
        let all = vec![target("Prod"), target("Beta"), target("prod")];
        let found = get_targets_by_name(&["PROD", "beta"], &all).unwrap();
        assert_eq!(names(&found), ["Prod", "prod", "Beta"]);
    }

    #[test]
    fn test_all_or_nothing() {
        let all = vec![target("Alpha"), target("Beta")];
        assert!(get_targets_by_name(&["alpha", "delta"], &all).is_none());
        assert_eq!(missing_names(&["alpha", "Delta", "delta", "x"], &all), ["Delta", "x"]);
    }

    #[test]
    fn test_empty_request() {
        let all = vec![target("Alpha")];
        let found = get_targets_by_name::<&str>(&[], &all).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_unnamed_targets_match_generated_name() {
        let mut unnamed = Target::new("local");
        unnamed.index = 1;
        let all = vec![target("Alpha"), unnamed];

        assert!(get_targets_by_name(&["local"], &all).is_none());
        let found = get_targets_by_name(&["(target #2)"], &all).unwrap();
        assert_eq!(found[0].kind, "local");
    }
}
