//! Publish plugin registry.

use tracing::{debug, warn};

use super::PublishPlugin;

/// The set of publish plugins available to a session, in registration
/// order. Attachment order during the accept pass follows registration
/// order, so task ordering on an item is deterministic.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn PublishPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A plugin with the same id replaces the earlier
    /// registration in place.
    pub fn register(&mut self, plugin: Box<dyn PublishPlugin>) {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.id() == plugin.id()) {
            warn!(plugin = %plugin.id(), "replacing already-registered plugin");
            *existing = plugin;
            return;
        }
        debug!(plugin = %plugin.id(), "registered plugin");
        self.plugins.push(plugin);
    }

    pub fn get(&self, id: &str) -> Option<&dyn PublishPlugin> {
        self.plugins.iter().find(|p| p.id() == id).map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PublishPlugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Acceptance, PluginContext, PluginError};
    use super::*;
    use crate::settings::{ResolvedSettings, SettingsSchema};
    use crate::tree::{ItemId, TaskId};

    struct StubPlugin {
        id: &'static str,
        name: &'static str,
    }

    impl PublishPlugin for StubPlugin {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }

        fn item_filters(&self) -> Vec<String> {
            vec!["*".to_string()]
        }

        fn settings_schema(&self) -> SettingsSchema {
            SettingsSchema::new()
        }

        fn accept(
            &self,
            _ctx: &mut PluginContext<'_>,
            _item: ItemId,
            _settings: &ResolvedSettings,
        ) -> Acceptance {
            Acceptance::accepted()
        }

        fn validate(
            &self,
            _ctx: &mut PluginContext<'_>,
            _item: ItemId,
            _task: TaskId,
        ) -> Result<(), PluginError> {
            Ok(())
        }

        fn publish(
            &self,
            _ctx: &mut PluginContext<'_>,
            _item: ItemId,
            _task: TaskId,
        ) -> Result<(), PluginError> {
            Ok(())
        }

        fn finalize(
            &self,
            _ctx: &mut PluginContext<'_>,
            _item: ItemId,
            _task: TaskId,
        ) -> Result<(), PluginError> {
            Ok(())
        }

        fn undo(
            &self,
            _ctx: &mut PluginContext<'_>,
            _item: ItemId,
            _task: TaskId,
        ) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(StubPlugin {
            id: "publish-file",
            name: "Publish File",
        }));
        registry.register(Box::new(StubPlugin {
            id: "upload-review",
            name: "Upload for Review",
        }));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("publish-file").unwrap().name(), "Publish File");
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_duplicate_id_replaces_in_place() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(StubPlugin {
            id: "publish-file",
            name: "Old",
        }));
        registry.register(Box::new(StubPlugin {
            id: "publish-file",
            name: "New",
        }));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("publish-file").unwrap().name(), "New");
        // Registration order is preserved for later plugins.
        let ids: Vec<&str> = registry.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["publish-file"]);
    }
}
