//! Registry mapping target types to plugin instances.

use std::sync::Arc;

use indexmap::IndexMap;
use shipwright_core::normalize_name;

use crate::backends::local::LocalFactory;
use crate::backends::test::TestPlugin;
use crate::backends::zip::ZipPlugin;
use crate::capability::Operation;
use crate::client::AsyncFileClientPlugin;
use crate::context::PluginContext;
use crate::iterable::IterablePlugin;
use crate::meta::{
    batch::BatchExpander, each::EachExpander, map::MapExpander, prompt::PromptExpander,
    switch::SwitchExpander,
};
use crate::plugin::Plugin;

/// Plugins registered per target type, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Vec<Arc<dyn Plugin>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in meta-target and backend.
    pub fn with_builtin(context: PluginContext) -> Self {
        let mut registry = Self::new();
        registry.register(IterablePlugin::new(BatchExpander, context.clone()));
        registry.register(IterablePlugin::new(EachExpander, context.clone()));
        registry.register(IterablePlugin::new(MapExpander, context.clone()));
        registry.register(IterablePlugin::new(SwitchExpander, context.clone()));
        registry.register(IterablePlugin::new(PromptExpander, context.clone()));
        registry.register(AsyncFileClientPlugin::new(LocalFactory, context.clone()));
        registry.register(ZipPlugin::new(context.clone()));
        registry.register(TestPlugin::new(context));
        registry
    }

    /// Register a plugin under its own type.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        self.register_arc(Arc::new(plugin))
    }

    /// Register a shared plugin instance.
    pub fn register_arc(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        let kind = normalize_name(plugin.kind());
        tracing::debug!(target: "registry", kind = %kind, "registered plugin");
        self.plugins.entry(kind).or_default().push(plugin);
        self
    }

    /// Plugins for `kind` that support `operation`, in registration order.
    pub fn plugins_for(&self, kind: &str, operation: Operation) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .get(&normalize_name(kind))
            .into_iter()
            .flatten()
            .filter(|p| p.capabilities().supports(operation))
            .cloned()
            .collect()
    }

    /// Whether any plugin is registered for `kind`.
    pub fn has_type(&self, kind: &str) -> bool {
        self.plugins.contains_key(&normalize_name(kind))
    }

    /// Registered target types.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Dispose every registered plugin.
    pub fn dispose(&self) {
        for plugin in self.plugins.values().flatten() {
            plugin.dispose();
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kinds", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;

    struct ListOnly;

    impl Plugin for ListOnly {
        fn kind(&self) -> &str {
            "Remote"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::LIST
        }
    }

    #[test]
    fn test_builtin_types() {
        let registry = PluginRegistry::with_builtin(PluginContext::default());
        for kind in ["batch", "each", "map", "switch", "prompt", "local", "zip", "test"] {
            assert!(registry.has_type(kind), "missing {kind}");
        }
        assert!(!registry.has_type("ftp"));
    }

    #[test]
    fn test_plugins_for_filters_capabilities() {
        let mut registry = PluginRegistry::new();
        registry.register(ListOnly);

        assert!(registry.has_type(" remote "));
        assert_eq!(registry.plugins_for("REMOTE", Operation::List).len(), 1);
        assert!(registry.plugins_for("remote", Operation::Upload).is_empty());
    }

    #[test]
    fn test_zip_is_upload_only() {
        let registry = PluginRegistry::with_builtin(PluginContext::default());
        assert_eq!(registry.plugins_for("zip", Operation::Upload).len(), 1);
        assert!(registry.plugins_for("zip", Operation::List).is_empty());
    }
}
