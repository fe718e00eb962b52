//! The owning context every dispatch runs in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use shipwright_core::{
    DeployError, DeployResult, Settings, Target, Values, WorkspaceConfig, normalize_name,
};

use crate::capability::Operation;
use crate::meta::prompt::{DismissPrompter, Prompter};
use crate::plugin::Plugin;
use crate::registry::PluginRegistry;
use crate::resolver::{get_targets_by_name, missing_names};

/// Currently selected option per switch target.
///
/// Keys are normalized switch target names, values are option names.
#[derive(Debug, Default)]
pub struct SwitchStates {
    selected: Mutex<HashMap<String, String>>,
}

impl SwitchStates {
    /// Create an empty state table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `option` for the switch target named `switch`.
    pub fn select(&self, switch: &str, option: impl Into<String>) {
        self.lock().insert(normalize_name(switch), option.into());
    }

    /// The option selected for `switch`, if any.
    pub fn selected(&self, switch: &str) -> Option<String> {
        self.lock().get(&normalize_name(switch)).cloned()
    }

    /// Forget the selection for `switch`.
    pub fn reset(&self, switch: &str) {
        self.lock().remove(&normalize_name(switch));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // The map stays consistent even if a holder panicked.
        self.selected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Configured targets plus everything plugins need to look up while running.
pub struct Workspace {
    name: String,
    root: PathBuf,
    package: Option<String>,
    targets: Vec<Target>,
    registry: Arc<PluginRegistry>,
    values: Values,
    prompter: Arc<dyn Prompter>,
    switches: SwitchStates,
    prompt_cache: Mutex<HashMap<String, Settings>>,
}

impl Workspace {
    /// Create an empty workspace rooted at `root`.
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            package: None,
            targets: Vec::new(),
            registry,
            values: Values::new(),
            prompter: Arc::new(DismissPrompter),
            switches: SwitchStates::new(),
            prompt_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Build a workspace from a loaded config file.
    ///
    /// Without a configured name, the root directory's name is used.
    pub fn from_config(
        config: WorkspaceConfig,
        root: impl Into<PathBuf>,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        let root = root.into();
        let name = config.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "workspace".to_string())
        });

        let mut workspace = Self::new(name, root, registry)
            .with_targets(config.targets)
            .with_values(config.values);
        workspace.package = config.package;
        workspace
    }

    /// Replace the configured targets. Indexes are reassigned by position.
    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        for (index, target) in self.targets.iter_mut().enumerate() {
            target.index = index;
        }
        self
    }

    /// Replace the placeholder values.
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Set the package used for visibility filtering.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Set the prompter used by prompt targets.
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    pub fn switches(&self) -> &SwitchStates {
        &self.switches
    }

    /// All configured targets, in configuration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Targets visible for the workspace package.
    pub fn visible_targets(&self) -> Vec<&Target> {
        self.targets
            .iter()
            .filter(|t| t.is_visible_for(self.package()))
            .collect()
    }

    /// Find a configured target by (normalized) display name.
    pub fn find_target(&self, name: &str) -> Option<&Target> {
        let name = normalize_name(name);
        self.targets.iter().find(|t| t.normalized_name() == name)
    }

    /// Resolve target names, failing with the list of unknown names.
    pub fn targets_by_name<S: AsRef<str>>(&self, names: &[S]) -> DeployResult<Vec<Target>> {
        get_targets_by_name(names, &self.targets).ok_or_else(|| DeployError::TargetNotFound {
            names: missing_names(names, &self.targets),
        })
    }

    /// Plugins that handle `target` for `operation`.
    ///
    /// Fails when no plugin is registered for the target type at all, or
    /// when none of the registered ones supports the operation.
    pub fn plugins_for(
        &self,
        target: &Target,
        operation: Operation,
    ) -> DeployResult<Vec<Arc<dyn Plugin>>> {
        if !self.registry.has_type(&target.kind) {
            return Err(DeployError::NoPlugin {
                kind: target.kind.clone(),
                operation: operation.to_string(),
            });
        }

        let plugins = self.registry.plugins_for(&target.kind, operation);
        if plugins.is_empty() {
            return Err(DeployError::not_implemented(&target.kind, operation));
        }
        Ok(plugins)
    }

    /// Substitute `${name}` and `${env:VAR}` placeholders.
    pub fn replace_with_values(&self, text: &str) -> String {
        self.values.replace(text)
    }

    /// Resolve a configured directory against the workspace root.
    pub fn resolve_dir(&self, dir: &str) -> PathBuf {
        let dir = self.replace_with_values(dir.trim());
        let path = Path::new(&dir);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Answers a prompt target collected earlier in this session.
    pub fn cached_answers(&self, target: &Target) -> Option<Settings> {
        self.prompt_cache().get(&target.normalized_name()).cloned()
    }

    /// Remember the answers given for a prompt target.
    pub fn cache_answers(&self, target: &Target, answers: Settings) {
        self.prompt_cache().insert(target.normalized_name(), answers);
    }

    fn prompt_cache(&self) -> MutexGuard<'_, HashMap<String, Settings>> {
        self.prompt_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("package", &self.package)
            .field("targets", &self.targets.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
