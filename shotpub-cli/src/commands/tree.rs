//! The `tree` command: inspect a saved publish tree file.

use std::env;
use std::path::PathBuf;

use clap::Args;
use shotpub::tree::PublishTree;

use crate::commands::common::{self, TREE_FILE_VAR};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Tree file to show (defaults to $SHOTPUB_TREE_FILE)
    pub file: Option<PathBuf>,
}

pub fn run(args: TreeArgs) -> Result<(), CliError> {
    let path = args
        .file
        .or_else(|| env::var(TREE_FILE_VAR).ok().map(PathBuf::from))
        .ok_or_else(|| {
            CliError::Config(format!(
                "no tree file given and {} is not set",
                TREE_FILE_VAR
            ))
        })?;

    let tree = PublishTree::load_file(&path)?;
    println!("Publish tree {} ({} items):", path.display(), tree.len());
    common::print_tree(&tree);
    Ok(())
}
