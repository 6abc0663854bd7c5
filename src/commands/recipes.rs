// src/commands/recipes.rs
//! Recipe catalogue commands

use super::open_context;
use anyhow::{Context, Result};
use kiln::{ContextOptions, DependencyWalker, RecipeRegistry};

/// List available recipes
pub fn cmd_recipes(options: ContextOptions, compact: bool) -> Result<()> {
    let ctx = open_context(options)?;
    let mut registry = RecipeRegistry::from_context(&ctx);
    let names = registry.list_available();

    if compact {
        println!("{}", names.join(" "));
        return Ok(());
    }

    if names.is_empty() {
        println!("No recipes found in:");
        for path in registry.search_paths() {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    for name in &names {
        let Some(recipe) = registry.get(name) else {
            continue;
        };
        // Unversioned recipes only show up in the compact listing
        if let Some(version) = recipe.version() {
            println!("{:<20} {:<12} {}", recipe.name(), version, recipe.description());
        }
    }

    Ok(())
}

/// Print the dependency tree of `target`
pub fn cmd_deps(options: ContextOptions, target: &str) -> Result<()> {
    let ctx = open_context(options)?;
    let mut registry = RecipeRegistry::from_context(&ctx);
    let walker = DependencyWalker::new(ctx.implicit_dependencies.iter().cloned());

    let nodes = walker
        .expand(target, &mut registry)
        .with_context(|| format!("Failed to resolve dependencies of {}", target))?;

    for node in &nodes {
        let mut line = format!("{}{}", "  ".repeat(node.level), node.name);
        if node.implicit {
            line.push_str(" (implicit)");
        }
        if !node.parents.is_empty() {
            let parents: Vec<&str> = node.parents.iter().map(String::as_str).collect();
            line.push_str(&format!("  <- {}", parents.join(", ")));
        }
        println!("{}", line);
    }

    println!();
    println!("Total: {} recipe(s)", nodes.iter().filter(|n| !n.implicit).count());
    Ok(())
}
