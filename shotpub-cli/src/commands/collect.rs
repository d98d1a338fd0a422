//! The `collect` command: build and inspect the tree without executing.

use std::path::PathBuf;

use clap::Args;
use shotpub::engine::CancelFlag;

use crate::commands::common::{self, SessionArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Files or folders to collect. With none given, the preload folder
    /// is collected instead.
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

pub fn run(args: CollectArgs, cancel: CancelFlag) -> Result<(), CliError> {
    let mut manager = common::build_manager(&args.session, cancel)?;

    if args.paths.is_empty() {
        manager.collect_session()?;
    } else {
        manager.collect_files(&args.paths)?;
    }

    common::print_tree(manager.tree());
    common::save_tree(&args.session, &manager)?;
    Ok(())
}
