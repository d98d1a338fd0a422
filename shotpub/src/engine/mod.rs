//! The publish execution engine.
//!
//! [`PublishManager`] owns the tree, the plugin registry, the collector
//! and the tracking service, and drives the collect, accept, validate,
//! publish and finalize phases in order. Per-task failures are recorded
//! in pass reports; the publish pass additionally rolls back the failed
//! task and skips the failed item's descendants, since their publishes
//! are presumed to depend on it.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::plugin::{
    self, Collector, PluginContext, PluginRegistry, PublishPlugin,
};
use crate::settings::{
    resolve_settings, resolve_template_fields, TemplateRegistry,
};
use crate::tracking::TrackingService;
use crate::tree::{Context, ItemId, PublishTree, TaskGenerator, TaskStatus};

mod environment;
mod error;
mod report;

pub use environment::{EnvironmentError, EnvironmentSettings, COLLECTOR_PLUGIN_KEY};
pub use error::EngineError;
pub use report::{PassKind, PassReport, RunReport, TaskOutcome};

/// Shared cooperative cancellation flag.
///
/// Checked between tasks, never mid-call: a plugin operation that has
/// started always runs to completion so state stays consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Name filters and pass sequencing applied to a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Glob patterns over item names. Empty matches every item.
    pub item_filters: Vec<String>,

    /// Glob patterns over task names. Empty matches every task.
    pub task_filters: Vec<String>,

    /// Whether a validation failure stops the run before publishing.
    /// When false, tasks that did validate are still published; failed
    /// tasks stay behind either way.
    pub abort_on_validation_failure: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            item_filters: Vec::new(),
            task_filters: Vec::new(),
            abort_on_validation_failure: true,
        }
    }
}

impl RunOptions {
    pub fn with_item_filters(mut self, filters: Vec<String>) -> Self {
        self.item_filters = filters;
        self
    }

    pub fn with_task_filters(mut self, filters: Vec<String>) -> Self {
        self.task_filters = filters;
        self
    }

    pub fn with_abort_on_validation_failure(mut self, abort: bool) -> Self {
        self.abort_on_validation_failure = abort;
        self
    }
}

/// Owns a publish session end to end.
pub struct PublishManager {
    tree: PublishTree,
    registry: PluginRegistry,
    collector: Box<dyn Collector>,
    tracking: Box<dyn TrackingService>,
    templates: TemplateRegistry,
    environment: EnvironmentSettings,
    default_context: Option<Context>,
    cancel: CancelFlag,
}

impl PublishManager {
    pub fn new(collector: Box<dyn Collector>, tracking: Box<dyn TrackingService>) -> Self {
        Self {
            tree: PublishTree::new(),
            registry: PluginRegistry::new(),
            collector,
            tracking,
            templates: TemplateRegistry::new(),
            environment: EnvironmentSettings::new(),
            default_context: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentSettings) -> Self {
        self.environment = environment;
        self
    }

    /// Context assigned to collected items that resolve none of their own.
    pub fn with_default_context(mut self, context: Context) -> Self {
        self.default_context = Some(context);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Continue a session from a previously saved tree.
    pub fn with_tree(mut self, tree: PublishTree) -> Self {
        self.tree = tree;
        self
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PublishPlugin>) {
        self.registry.register(plugin);
    }

    pub fn tree(&self) -> &PublishTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PublishTree {
        &mut self.tree
    }

    pub fn tracking(&self) -> &dyn TrackingService {
        self.tracking.as_ref()
    }

    /// Collect items for the given paths and attach tasks to them.
    ///
    /// Paths that already have an item in the tree are skipped, so a
    /// repeat drop of the same file is a no-op. File-collected items are
    /// marked persistent and survive a session re-collect.
    pub fn collect_files(&mut self, paths: &[PathBuf]) -> Result<Vec<ItemId>, EngineError> {
        let already = plugin::collected_paths(&self.tree);
        let settings = self.collector_settings()?;
        let root = self.tree.root();

        let mut created = Vec::new();
        for path in paths {
            if already.contains(path) {
                info!(path = %path.display(), "path already collected, skipping");
                continue;
            }
            let mut ctx = PluginContext {
                tree: &mut self.tree,
                tracking: self.tracking.as_mut(),
                templates: &self.templates,
            };
            let items = self
                .collector
                .process_file(&mut ctx, &settings, root, path)
                .map_err(EngineError::Collection)?;
            for item in &items {
                self.tree.item_mut(*item).persistent = true;
            }
            created.extend(items);
        }

        self.assign_default_context(&created);
        self.attach_tasks(&created);
        Ok(created)
    }

    /// Re-collect the current session: clear non-persistent items, ask
    /// the collector for session items and attach tasks.
    pub fn collect_session(&mut self) -> Result<Vec<ItemId>, EngineError> {
        self.tree.clear(true);
        let settings = self.collector_settings()?;
        let root = self.tree.root();

        let mut ctx = PluginContext {
            tree: &mut self.tree,
            tracking: self.tracking.as_mut(),
            templates: &self.templates,
        };
        let created = self
            .collector
            .process_current_session(&mut ctx, &settings, root)
            .map_err(EngineError::Collection)?;

        self.assign_default_context(&created);
        self.attach_tasks(&created);
        Ok(created)
    }

    /// Run the accept pass over the given items and their descendants:
    /// each registered plugin whose filters match is offered the item
    /// and a task is attached for every acceptance.
    ///
    /// A settings-resolution failure is scoped to the one plugin/item
    /// pair it occurred for. The pair is logged and skipped; every other
    /// combination still gets its task.
    pub fn attach_tasks(&mut self, items: &[ItemId]) {
        let mut queue: Vec<ItemId> = Vec::new();
        for item in items {
            queue.push(*item);
            queue.extend(self.tree.descendants(*item));
        }

        for item in queue {
            let type_tag = self.tree.item(item).type_tag.clone();
            let context = self.tree.context_for(item).cloned();
            let item_fields = self.tree.item(item).fields();

            for plugin in self.registry.iter() {
                if !plugin::matches_item_filters(&plugin.item_filters(), &type_tag) {
                    continue;
                }

                let env = self
                    .environment
                    .overrides_for(context.as_ref().map(|c| c.key.as_str()), plugin.id());
                let mut settings =
                    match resolve_settings(&plugin.settings_schema(), env, Some(&type_tag), None) {
                        Ok(settings) => settings,
                        Err(err) => {
                            error!(
                                item = %self.tree.item(item),
                                plugin = plugin.id(),
                                error = %err,
                                "settings resolution failed, plugin skipped for this item"
                            );
                            continue;
                        }
                    };
                let empty = Default::default();
                let context_fields = context.as_ref().map(|c| &c.fields).unwrap_or(&empty);
                resolve_template_fields(
                    &mut settings,
                    &self.templates,
                    context_fields,
                    &item_fields,
                );

                let mut ctx = PluginContext {
                    tree: &mut self.tree,
                    tracking: self.tracking.as_mut(),
                    templates: &self.templates,
                };
                let acceptance = plugin.accept(&mut ctx, item, &settings);
                if !acceptance.accepted {
                    continue;
                }
                self.tree.add_task(
                    item,
                    plugin.id(),
                    plugin.name(),
                    settings,
                    acceptance.enabled && acceptance.checked,
                    acceptance.visible,
                );
            }
        }
    }

    /// Reassign an item's context, then refresh its cached state and
    /// tasks: existing tasks are dropped and the accept pass reruns with
    /// settings resolved for the new context.
    pub fn set_item_context(&mut self, item: ItemId, context: Context) -> Result<(), EngineError> {
        info!(item = %self.tree.item(item), context = %context, "reassigning context");
        self.tree.item_mut(item).context = Some(context);

        let mut affected = vec![item];
        affected.extend(self.tree.descendants(item));
        for affected_item in &affected {
            let mut ctx = PluginContext {
                tree: &mut self.tree,
                tracking: self.tracking.as_mut(),
                templates: &self.templates,
            };
            self.collector
                .on_context_changed(&mut ctx, *affected_item)
                .map_err(EngineError::Collection)?;
            self.tree.clear_tasks(*affected_item);
        }
        self.attach_tasks(&[item]);
        Ok(())
    }

    /// Run the validate pass. Every active matching task is validated;
    /// failures are collected in the report, never short-circuited.
    pub fn validate(&mut self, options: &RunOptions) -> Result<PassReport, EngineError> {
        info!("starting validate pass");
        let mut generator = TaskGenerator::new(&options.item_filters, &options.task_filters)?;
        let mut report = PassReport::new(PassKind::Validate);

        while let Some(handle) = generator.next(&self.tree) {
            if self.cancel.is_cancelled() {
                warn!("validate pass cancelled");
                break;
            }

            let (item_name, task_name, plugin_id) = self.task_names(handle);
            let plugin = self
                .registry
                .get(&plugin_id)
                .ok_or_else(|| EngineError::UnknownPlugin(plugin_id.clone()))?;

            let mut ctx = PluginContext {
                tree: &mut self.tree,
                tracking: self.tracking.as_mut(),
                templates: &self.templates,
            };
            let (status, message) = match plugin.validate(&mut ctx, handle.item, handle.task) {
                Ok(()) => (TaskStatus::Validated, None),
                Err(err) => {
                    warn!(item = %item_name, task = %task_name, error = %err, "validation failed");
                    (TaskStatus::ValidationFailed, Some(err.to_string()))
                }
            };

            self.set_task_status(handle, status);
            generator.report_status(&self.tree, handle, status);
            report.record(item_name, task_name, status, message);
        }

        info!(
            tasks = report.outcomes.len(),
            failures = report.failures().count(),
            "validate pass complete"
        );
        Ok(report)
    }

    /// Run the publish pass over validated tasks.
    ///
    /// A publish failure triggers the task's undo immediately, and every
    /// descendant of the failed item is skipped for the rest of the pass.
    /// Siblings are unaffected. Undo failures are logged, never raised;
    /// the original publish failure is what the report carries.
    pub fn publish(&mut self, options: &RunOptions) -> Result<PassReport, EngineError> {
        info!("starting publish pass");
        let mut generator = TaskGenerator::new(&options.item_filters, &options.task_filters)?;
        let mut report = PassReport::new(PassKind::Publish);
        let mut skipped: BTreeSet<ItemId> = BTreeSet::new();

        while let Some(handle) = generator.next(&self.tree) {
            if self.cancel.is_cancelled() {
                warn!("publish pass cancelled");
                break;
            }

            let (item_name, task_name, plugin_id) = self.task_names(handle);

            if skipped.contains(&handle.item) {
                info!(item = %item_name, task = %task_name, "skipped: ancestor publish failed");
                self.set_task_status(handle, TaskStatus::SkippedDependency);
                generator.report_status(&self.tree, handle, TaskStatus::SkippedDependency);
                report.record(
                    item_name,
                    task_name,
                    TaskStatus::SkippedDependency,
                    Some("an ancestor item's publish failed".to_string()),
                );
                continue;
            }

            let current = self.task_status(handle);
            if current != Some(TaskStatus::Validated) {
                debug!(item = %item_name, task = %task_name, "not validated, skipping publish");
                continue;
            }

            let plugin = self
                .registry
                .get(&plugin_id)
                .ok_or_else(|| EngineError::UnknownPlugin(plugin_id.clone()))?;
            let mut ctx = PluginContext {
                tree: &mut self.tree,
                tracking: self.tracking.as_mut(),
                templates: &self.templates,
            };

            match plugin.publish(&mut ctx, handle.item, handle.task) {
                Ok(()) => {
                    self.set_task_status(handle, TaskStatus::Published);
                    generator.report_status(&self.tree, handle, TaskStatus::Published);
                    report.record(item_name, task_name, TaskStatus::Published, None);
                }
                Err(err) => {
                    error!(item = %item_name, task = %task_name, error = %err, "publish failed");
                    let status = match plugin.undo(&mut ctx, handle.item, handle.task) {
                        Ok(()) => TaskStatus::RolledBack,
                        Err(undo_err) => {
                            error!(
                                item = %item_name,
                                task = %task_name,
                                error = %undo_err,
                                "undo failed, external state may be partial"
                            );
                            TaskStatus::PublishFailed
                        }
                    };
                    self.set_task_status(handle, status);
                    generator.report_status(&self.tree, handle, status);
                    report.record(item_name, task_name, status, Some(err.to_string()));
                    skipped.extend(self.tree.descendants(handle.item));
                }
            }
        }

        info!(
            tasks = report.outcomes.len(),
            failures = report.failures().count(),
            "publish pass complete"
        );
        Ok(report)
    }

    /// Run the finalize pass over published tasks. Best-effort: failures
    /// are recorded and the pass continues; nothing is undone.
    pub fn finalize(&mut self, options: &RunOptions) -> Result<PassReport, EngineError> {
        info!("starting finalize pass");
        let mut generator = TaskGenerator::new(&options.item_filters, &options.task_filters)?;
        let mut report = PassReport::new(PassKind::Finalize);

        while let Some(handle) = generator.next(&self.tree) {
            if self.cancel.is_cancelled() {
                warn!("finalize pass cancelled");
                break;
            }

            if self.task_status(handle) != Some(TaskStatus::Published) {
                continue;
            }

            let (item_name, task_name, plugin_id) = self.task_names(handle);
            let plugin = self
                .registry
                .get(&plugin_id)
                .ok_or_else(|| EngineError::UnknownPlugin(plugin_id.clone()))?;
            let mut ctx = PluginContext {
                tree: &mut self.tree,
                tracking: self.tracking.as_mut(),
                templates: &self.templates,
            };

            let (status, message) = match plugin.finalize(&mut ctx, handle.item, handle.task) {
                Ok(()) => (TaskStatus::Finalized, None),
                Err(err) => {
                    warn!(item = %item_name, task = %task_name, error = %err, "finalize failed");
                    (TaskStatus::FinalizeFailed, Some(err.to_string()))
                }
            };
            self.set_task_status(handle, status);
            generator.report_status(&self.tree, handle, status);
            report.record(item_name, task_name, status, message);
        }

        info!(tasks = report.outcomes.len(), "finalize pass complete");
        Ok(report)
    }

    /// Run validate, publish and finalize in order.
    ///
    /// By default publishing does not start if any validation failed;
    /// [`RunOptions::abort_on_validation_failure`] set to false publishes
    /// the tasks that did validate instead. A cancellation request stops
    /// the run at the next task boundary either way.
    pub fn run(&mut self, options: &RunOptions) -> Result<RunReport, EngineError> {
        let mut run = RunReport::default();

        let validate = self.validate(options)?;
        let validated = validate.is_success();
        run.passes.push(validate);
        run.cancelled = self.cancel.is_cancelled();
        if run.cancelled {
            return Ok(run);
        }
        if !validated {
            if options.abort_on_validation_failure {
                warn!("validation failed, publish will not run");
                return Ok(run);
            }
            warn!("validation failed, publishing the tasks that passed");
        }

        run.passes.push(self.publish(options)?);
        run.cancelled = self.cancel.is_cancelled();
        if run.cancelled {
            return Ok(run);
        }

        run.passes.push(self.finalize(options)?);
        run.cancelled = self.cancel.is_cancelled();
        Ok(run)
    }

    fn collector_settings(
        &self,
    ) -> Result<crate::settings::ResolvedSettings, EngineError> {
        let context_key = self.default_context.as_ref().map(|c| c.key.as_str());
        let env = self
            .environment
            .overrides_for(context_key, COLLECTOR_PLUGIN_KEY);
        resolve_settings(&self.collector.settings_schema(), env, None, None).map_err(|source| {
            EngineError::Settings {
                plugin: COLLECTOR_PLUGIN_KEY.to_string(),
                source,
            }
        })
    }

    fn assign_default_context(&mut self, items: &[ItemId]) {
        let Some(default) = self.default_context.clone() else {
            return;
        };
        for item in items {
            if self.tree.context_for(*item).is_none() {
                self.tree.item_mut(*item).context = Some(default.clone());
            }
        }
    }

    fn task_names(&self, handle: crate::tree::TaskHandle) -> (String, String, String) {
        let item = self.tree.item(handle.item);
        let task = item
            .task(handle.task)
            .expect("handle from the generator refers to an existing task");
        (item.name.clone(), task.name.clone(), task.plugin_id.clone())
    }

    fn task_status(&self, handle: crate::tree::TaskHandle) -> Option<TaskStatus> {
        self.tree
            .item(handle.item)
            .task(handle.task)
            .map(|t| t.status)
    }

    fn set_task_status(&mut self, handle: crate::tree::TaskHandle, status: TaskStatus) {
        if let Some(task) = self.tree.item_mut(handle.item).task_mut(handle.task) {
            task.status = status;
        }
    }
}
