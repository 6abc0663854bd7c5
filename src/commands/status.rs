// src/commands/status.rs
//! Build status command

use super::open_context;
use anyhow::Result;
use kiln::{ContextOptions, RecipeRegistry, StateStore};

/// Show whether each available recipe is built
pub fn cmd_status(options: ContextOptions) -> Result<()> {
    let ctx = open_context(options)?;
    let registry = RecipeRegistry::from_context(&ctx);
    let mut state = StateStore::new(ctx.state_path());

    let names = registry.list_available();
    let mut built = 0;

    for name in &names {
        if state.is_built(name) {
            built += 1;
            match state.built_at(name) {
                Some(at) => println!(
                    "{:<20} Build OK (built at {})",
                    name,
                    at.format("%Y-%m-%d %H:%M:%S")
                ),
                None => println!("{:<20} Build OK", name),
            }
        } else {
            println!("{:<20} Not built", name);
        }
    }

    println!();
    println!("{} of {} recipe(s) built", built, names.len());
    println!("State file: {}", state.path().display());
    Ok(())
}
