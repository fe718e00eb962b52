//! Remote path normalization and per-target path mappings.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// A rule rewriting the remote directory of a file for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Directory prefix (or pattern, when `regex` is set) to match.
    pub source: String,

    /// Replacement directory. May use `$1`-style groups in regex mode.
    pub target: String,

    /// Treat `source` as a regular expression.
    #[serde(default, alias = "isRegEx")]
    pub regex: bool,
}

impl PathMapping {
    /// Create a prefix mapping.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            regex: false,
        }
    }

    /// Create a regex mapping.
    pub fn regex(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            regex: true,
        }
    }

    /// Apply this rule to an already normalized path.
    ///
    /// Returns `None` when the rule does not match.
    pub fn apply(&self, path: &str) -> DeployResult<Option<String>> {
        if self.regex {
            let re = Regex::new(&self.source).map_err(|e| {
                DeployError::config(format!("Invalid mapping pattern '{}': {e}", self.source))
            })?;
            if !re.is_match(path) {
                return Ok(None);
            }
            let replaced = re.replace(path, self.target.as_str());
            return Ok(Some(normalize_remote_path(&replaced)));
        }

        let source = normalize_remote_path(&self.source);
        let rest = if source.is_empty() {
            Some(path)
        } else if path == source {
            Some("")
        } else {
            path.strip_prefix(&source).and_then(|r| r.strip_prefix('/'))
        };

        Ok(rest.map(|rest| join_remote(&[&self.target, rest])))
    }
}

/// Apply the first matching mapping to `path`; unmatched paths pass through.
pub fn apply_mappings(path: &str, mappings: &[PathMapping]) -> DeployResult<String> {
    let path = normalize_remote_path(path);
    for mapping in mappings {
        if let Some(mapped) = mapping.apply(&path)? {
            return Ok(mapped);
        }
    }
    Ok(path)
}

/// Normalize a remote-relative path: POSIX separators, no empty or `.`
/// segments, no leading or trailing slash.
pub fn normalize_remote_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join path segments with `/`, skipping empty segments.
///
/// A leading slash on the first segment is preserved so absolute remote
/// roots stay absolute.
pub fn join_remote(segments: &[&str]) -> String {
    let absolute = segments
        .iter()
        .find(|s| !s.is_empty())
        .is_some_and(|s| s.starts_with('/'));

    let joined = segments
        .iter()
        .map(|s| normalize_remote_path(s))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_remote_path() {
        assert_eq!(normalize_remote_path("/a//b/./c/"), "a/b/c");
        assert_eq!(normalize_remote_path("a\\b"), "a/b");
        assert_eq!(normalize_remote_path(""), "");
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote(&["/var/www", "css", "site.css"]), "/var/www/css/site.css");
        assert_eq!(join_remote(&["", "css", "site.css"]), "css/site.css");
        assert_eq!(join_remote(&["", "", "site.css"]), "site.css");
    }

    #[test]
    fn test_prefix_mapping() {
        let mappings = vec![PathMapping::new("src/web", "public")];
        assert_eq!(apply_mappings("src/web/css", &mappings).unwrap(), "public/css");
        assert_eq!(apply_mappings("/src/web/", &mappings).unwrap(), "public");
        assert_eq!(apply_mappings("src/webapp", &mappings).unwrap(), "src/webapp");
    }

    #[test]
    fn test_first_match_wins() {
        let mappings = vec![
            PathMapping::new("a", "first"),
            PathMapping::new("a", "second"),
        ];
        assert_eq!(apply_mappings("a/b", &mappings).unwrap(), "first/b");
    }

    #[test]
    fn test_regex_mapping() {
        let mappings = vec![PathMapping::regex(r"^build/(\w+)$", "dist/$1")];
        assert_eq!(apply_mappings("build/js", &mappings).unwrap(), "dist/js");
        assert_eq!(apply_mappings("other", &mappings).unwrap(), "other");
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let mappings = vec![PathMapping::regex("(", "x")];
        assert!(matches!(
            apply_mappings("a", &mappings),
            Err(DeployError::Config { .. })
        ));
    }
}
