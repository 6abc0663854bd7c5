// src/recipe/mod.rs

//! Recipes for third-party libraries
//!
//! A recipe names a library, its version, the recipes it depends on, where
//! its source comes from and the shell steps that build it. Steps are
//! templates rendered per architecture.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "libffi"
//! version = "3.4.4"
//! depends = []
//!
//! [source]
//! url = "https://github.com/libffi/libffi/releases/download/v{version}/libffi-{version}.tar.gz"
//!
//! [build]
//! configure = "./configure --host={host} --prefix={prefix} --disable-shared"
//! make = "make {make_jobs}"
//! install = "make install"
//! libraries = [".libs/libffi.a"]
//! ```

mod format;
pub mod graph;
pub mod parser;
pub mod registry;

pub use format::{BuildSection, PackageSection, Recipe, SourceSection};
pub use graph::{BuildGraph, DependencyNode, DependencyWalker};
pub use parser::{parse_recipe, parse_recipe_file, split_version, validate_recipe};
pub use registry::RecipeRegistry;
