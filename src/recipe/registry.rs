// src/recipe/registry.rs

//! Recipe discovery and loading
//!
//! Search order is the built-in recipes directory followed by each custom
//! path in order; the first match wins. Inside a search path a recipe is
//! `<path>/<name>/recipe.toml`. A custom path may also point straight at a
//! single recipe directory whose name is the recipe name.
//!
//! Loaded recipes are cached, so asking for the same name twice returns
//! the same `Arc`.

use crate::context::BuildContext;
use crate::recipe::format::Recipe;
use crate::recipe::parser::{parse_recipe_file, split_version, validate_recipe};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of a recipe definition inside its directory
pub const RECIPE_FILE: &str = "recipe.toml";

/// Directory names never treated as recipes
const DEFAULT_SKIP_LIST: &[&str] = &["__pycache__", "target"];

#[derive(Debug, Default)]
pub struct RecipeRegistry {
    /// Built-in path first, then custom paths
    search_paths: Vec<PathBuf>,
    builddir: PathBuf,
    skip_list: Vec<String>,
    recipes: HashMap<String, Arc<Recipe>>,
}

impl RecipeRegistry {
    pub fn new(search_paths: Vec<PathBuf>, builddir: impl Into<PathBuf>) -> Self {
        Self {
            search_paths,
            builddir: builddir.into(),
            skip_list: DEFAULT_SKIP_LIST.iter().map(|s| s.to_string()).collect(),
            recipes: HashMap::new(),
        }
    }

    /// Registry over the search paths of a build context
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(ctx.recipe_paths(), &ctx.builddir)
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Add an already constructed recipe, running its after-load hook
    pub fn register(&mut self, mut recipe: Recipe) -> Arc<Recipe> {
        let dir = recipe.recipe_dir.clone();
        recipe.after_load(&dir, &self.builddir);
        let recipe = Arc::new(recipe);
        self.recipes
            .insert(recipe.name().to_string(), Arc::clone(&recipe));
        recipe
    }

    /// Load a recipe by name, optionally suffixed with `==version`
    ///
    /// The version suffix only applies when the recipe declares none, and
    /// only on first load. `None` means the recipe does not exist or failed
    /// to load; the failure is logged.
    pub fn get(&mut self, spec: &str) -> Option<Arc<Recipe>> {
        let (name, version) = split_version(spec);
        if let Some(recipe) = self.recipes.get(name) {
            return Some(Arc::clone(recipe));
        }

        let (dir, mut recipe) = self.load(name)?;

        if recipe.package.version.is_none() {
            if let Some(version) = version {
                debug!("{}: using requested version {}", name, version);
                recipe.package.version = Some(version.to_string());
            }
        }

        match validate_recipe(&recipe) {
            Ok(warnings) => {
                for warning in warnings {
                    debug!("{}: {}", name, warning);
                }
            }
            Err(e) => {
                warn!("Recipe {} in {} is invalid: {}", name, dir.display(), e);
                return None;
            }
        }

        recipe.after_load(&dir, &self.builddir);
        let recipe = Arc::new(recipe);
        self.recipes.insert(name.to_string(), Arc::clone(&recipe));
        Some(recipe)
    }

    /// Find and parse `name` along the search path
    fn load(&self, name: &str) -> Option<(PathBuf, Recipe)> {
        if name.is_empty() || self.is_skipped(name) {
            return None;
        }

        for (idx, path) in self.search_paths.iter().enumerate() {
            let candidates = if idx == 0 {
                vec![path.join(name)]
            } else {
                vec![path.join(name), path.clone()]
            };

            for dir in candidates {
                if dir.file_name().and_then(|n| n.to_str()) != Some(name) {
                    continue;
                }
                let file = dir.join(RECIPE_FILE);
                if !file.is_file() {
                    continue;
                }
                if idx > 0 {
                    info!("Found recipe '{}' in custom path {}", name, path.display());
                }

                return match parse_recipe_file(&file) {
                    Ok(recipe) if recipe.name() == name => Some((dir, recipe)),
                    Ok(recipe) => {
                        warn!(
                            "{} declares name '{}', expected '{}'",
                            file.display(),
                            recipe.name(),
                            name
                        );
                        None
                    }
                    Err(e) => {
                        warn!("Failed to load recipe {}: {}", name, e);
                        None
                    }
                };
            }
        }

        debug!("recipe '{}' not found in {:?}", name, self.search_paths);
        None
    }

    fn is_skipped(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_list.iter().any(|s| s == name)
    }

    /// Names of every recipe on the search path, sorted case-insensitively
    pub fn list_available(&self) -> Vec<String> {
        let mut names = BTreeSet::new();

        for (idx, path) in self.search_paths.iter().enumerate() {
            if idx > 0 && path.join(RECIPE_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.insert(name.to_string());
                }
            }

            let Ok(entries) = fs::read_dir(path) else {
                continue;
            };
            for entry in entries.flatten() {
                let dir = entry.path();
                let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !self.is_skipped(name) && dir.join(RECIPE_FILE).is_file() {
                    names.insert(name.to_string());
                }
            }
        }

        let mut names: Vec<String> = names.into_iter().collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    /// Load every available recipe, skipping ones that fail
    pub fn load_all(&mut self) -> Vec<Arc<Recipe>> {
        self.list_available()
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }
}
