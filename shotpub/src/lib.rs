//! Shotpub - publish orchestration for creative-production pipelines.
//!
//! This library collects candidate files into a tree of publishable items,
//! runs validate/publish/finalize plugins against each item, and registers
//! the resulting artifacts (path, version, dependencies) with a production
//! tracking service.
//!
//! # Architecture
//!
//! - [`pathutil`] - frame-sequence and version-number inference over paths
//! - [`settings`] - layered plugin configuration with template resolution
//! - [`tree`] - the publish item/task tree and its task generator
//! - [`plugin`] - collector and publish plugin contracts plus the built-in
//!   file collector and file publish plugin
//! - [`engine`] - the publish manager driving the three execution passes
//! - [`tracking`] - the tracking-service collaborator interface
//! - [`fileutil`] - sequence-aware file copy/delete helpers

pub mod engine;
pub mod fileutil;
pub mod logging;
pub mod pathutil;
pub mod plugin;
pub mod settings;
pub mod tracking;
pub mod tree;
