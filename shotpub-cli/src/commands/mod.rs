//! CLI command implementations.

pub mod collect;
pub mod common;
pub mod run;
pub mod tree;
