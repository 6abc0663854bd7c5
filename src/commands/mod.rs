// src/commands/mod.rs
//! Command handlers for the kiln CLI

mod build;
mod info;
mod recipes;
mod status;

pub use build::{cmd_build, cmd_clean};
pub use info::{cmd_build_info, cmd_info};
pub use recipes::{cmd_deps, cmd_recipes};
pub use status::cmd_status;

use anyhow::{Context, Result};
use kiln::{BuildContext, ContextOptions};

/// Resolve the build context for a command
pub(crate) fn open_context(options: ContextOptions) -> Result<BuildContext> {
    BuildContext::new(options).context("Failed to resolve build configuration")
}
