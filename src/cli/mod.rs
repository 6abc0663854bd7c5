// src/cli/mod.rs
//! CLI definitions for kiln
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `recipes` / `deps` - inspect the recipe catalogue
//! - `info` / `build-info` - inspect the resolved context and toolchains
//! - `build` / `status` / `clean` - cook recipes and manage build state

use clap::{Parser, Subcommand};

mod options;

pub use options::GlobalArgs;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author = "Kiln Contributors")]
#[command(version)]
#[command(about = "Cross-compile third-party libraries for mobile device and simulator SDKs", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available recipes
    Recipes {
        /// Print every recipe name on one line
        #[arg(long)]
        compact: bool,
    },

    /// Show the dependency tree of a recipe
    Deps {
        /// Recipe name, optionally name==version
        target: String,
    },

    /// Show the resolved context, SDKs and supported architectures
    Info,

    /// Print the build environment derived for an architecture
    BuildInfo {
        /// Platform SDK (iphoneos, iphonesimulator)
        sdk: String,

        /// CPU architecture (arm64, x86_64)
        arch: String,
    },

    /// Show which recipes are built
    Status,

    /// Build recipes and their dependencies
    Build {
        /// Platform SDK (iphoneos, iphonesimulator)
        sdk: String,

        /// CPU architectures to build for
        #[arg(required = true)]
        archs: Vec<String>,

        /// Recipe to build (repeatable)
        #[arg(short, long = "recipe", required = true)]
        recipes: Vec<String>,

        /// Rebuild even if already built
        #[arg(long)]
        force: bool,
    },

    /// Forget the build state of a recipe
    Clean {
        /// Recipe name
        recipe: String,

        /// Drop every state entry and the build directory
        #[arg(long)]
        all: bool,
    },
}
