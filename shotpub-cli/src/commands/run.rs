//! The `run` command: collect, validate, publish, finalize.

use std::path::PathBuf;

use clap::Args;
use shotpub::engine::{CancelFlag, RunOptions};
use tracing::info;

use crate::commands::common::{
    self, SessionArgs, ITEM_FILTERS_VAR, TASK_FILTERS_VAR,
};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Files or folders to publish. With none given, the preload folder
    /// is collected instead.
    pub paths: Vec<PathBuf>,

    /// Item name filter (glob); repeatable. Defaults to $SHOTPUB_ITEM_FILTERS
    #[arg(long = "item-filter", value_name = "GLOB")]
    pub item_filters: Vec<String>,

    /// Task name filter (glob); repeatable. Defaults to $SHOTPUB_TASK_FILTERS
    #[arg(long = "task-filter", value_name = "GLOB")]
    pub task_filters: Vec<String>,

    /// Stop after the validate pass
    #[arg(long)]
    pub validate_only: bool,

    /// Skip the publish pass when any validation failed. Pass false to
    /// publish the tasks that did validate
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub skip_publish_on_failure: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

pub fn run(args: RunArgs, cancel: CancelFlag) -> Result<(), CliError> {
    let mut manager = common::build_manager(&args.session, cancel)?;

    let items = if args.paths.is_empty() {
        manager.collect_session()?
    } else {
        manager.collect_files(&args.paths)?
    };
    info!(items = items.len(), "collection complete");
    if manager.tree().is_empty() {
        println!("Nothing to publish.");
        return Ok(());
    }

    let options = RunOptions::default()
        .with_item_filters(common::filters_or_env(&args.item_filters, ITEM_FILTERS_VAR))
        .with_task_filters(common::filters_or_env(&args.task_filters, TASK_FILTERS_VAR))
        .with_abort_on_validation_failure(args.skip_publish_on_failure);

    let result = if args.validate_only {
        let mut report = shotpub::engine::RunReport::default();
        report.passes.push(manager.validate(&options)?);
        report
    } else {
        manager.run(&options)?
    };

    common::save_tree(&args.session, &manager)?;
    common::report_result(&result)
}
