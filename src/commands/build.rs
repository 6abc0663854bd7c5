// src/commands/build.rs
//! Build and clean commands

use super::open_context;
use anyhow::{Context, Result};
use kiln::state::{self, BUILD_ALL};
use kiln::{ContextOptions, CookOptions, Kitchen, Shell, StateStore, Xcrun};
use std::fs;
use tracing::info;

/// Build `recipes` and their dependencies for each of `archs` on `sdk`
pub fn cmd_build(
    options: ContextOptions,
    sdk: &str,
    archs: &[String],
    recipes: &[String],
    force: bool,
) -> Result<()> {
    let ctx = open_context(options)?;
    let shell = Shell::system();
    let xcrun = Xcrun::new(shell.clone());
    let mut kitchen = Kitchen::new(&ctx, &xcrun, shell);

    let report = kitchen
        .cook(recipes, sdk, archs, &CookOptions::default().with_force(force))
        .with_context(|| format!("Failed to build {}", recipes.join(", ")))?;

    println!("Build order: {}", report.order.join(" -> "));
    if !report.skipped.is_empty() {
        println!("Already built: {}", report.skipped.join(", "));
    }
    if report.built.is_empty() {
        println!("Nothing to do");
    } else {
        println!("Built: {}", report.built.join(", "));
    }
    println!("Prefix: {}", ctx.prefix.display());

    Ok(())
}

/// Forget that `recipe` was built
///
/// Without `all` only the completion record goes, so the next build
/// resumes at the architectures that were not finished. With `all` every
/// state entry and the recipe's build directory are removed.
pub fn cmd_clean(options: ContextOptions, recipe: &str, all: bool) -> Result<()> {
    let ctx = open_context(options)?;
    let mut state = StateStore::new(ctx.state_path());

    if !all {
        let key = state::key(recipe, BUILD_ALL);
        let removed = state.delete(&key)?.is_some();
        state.delete(&format!("{}.at", key))?;
        if removed {
            println!("{} marked as not built", recipe);
        } else {
            println!("{} was not built", recipe);
        }
        return Ok(());
    }

    let removed = state.clear_recipe(recipe)?;
    let build_dir = ctx.builddir.join(recipe);
    if build_dir.exists() {
        info!("Removing {}", build_dir.display());
        fs::remove_dir_all(&build_dir)
            .with_context(|| format!("Failed to remove {}", build_dir.display()))?;
    }
    println!("Removed {} state entr{} for {}", removed, if removed == 1 { "y" } else { "ies" }, recipe);

    Ok(())
}
