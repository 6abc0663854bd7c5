// src/recipe/format.rs

//! Recipe file format definitions
//!
//! A recipe lives in its own directory as `recipe.toml`, next to any
//! patches or helper files it needs. Paths are bound by the loader, never
//! written by recipe authors.

use crate::error::Result;
use crate::template::{self, TemplateMap};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A buildable third-party library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: PackageSection,

    /// Source archive (optional; some recipes only install files)
    #[serde(default)]
    pub source: Option<SourceSection>,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// Directory holding `recipe.toml`
    #[serde(skip)]
    pub recipe_dir: PathBuf,

    /// Per-recipe build directory, `<builddir>/<name>`
    #[serde(skip)]
    pub build_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Recipes that must be built first, in declaration order
    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSection {
    /// Archive URL; `{version}` and `{name}` are substituted
    pub url: String,

    /// Directory the archive unpacks to, when it is not `<name>-<version>`
    #[serde(default)]
    pub subdir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Configure step (shell command template)
    #[serde(default)]
    pub configure: Option<String>,

    /// Compile step
    #[serde(default)]
    pub make: Option<String>,

    /// Install step
    #[serde(default)]
    pub install: Option<String>,

    /// Extra variables for every step; values are templates
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Build once per architecture (default) or once for all
    #[serde(default = "default_true")]
    pub per_arch: bool,

    /// Static libraries the build produces, relative to the source dir
    #[serde(default)]
    pub libraries: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            configure: None,
            make: None,
            install: None,
            environment: BTreeMap::new(),
            per_arch: true,
            libraries: Vec::new(),
        }
    }
}

impl Recipe {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn version(&self) -> Option<&str> {
        self.package.version.as_deref()
    }

    pub fn depends(&self) -> &[String] {
        &self.package.depends
    }

    pub fn description(&self) -> &str {
        self.package.description.as_deref().unwrap_or("")
    }

    /// Bind context dependent state; run once by the registry after loading
    pub fn after_load(&mut self, recipe_dir: &Path, builddir: &Path) {
        self.recipe_dir = recipe_dir.to_path_buf();
        self.build_dir = builddir.join(&self.package.name);
        if self.package.description.is_none() {
            self.package.description = Some(format!("recipe for {}", self.package.name));
        }
    }

    /// Template values describing this recipe
    pub fn template_values(&self) -> TemplateMap {
        let mut map = TemplateMap::new();
        map.insert("name".into(), json!(self.package.name));
        map.insert(
            "version".into(),
            json!(self.package.version.clone().unwrap_or_default()),
        );
        map.insert("recipe_dir".into(), json!(self.recipe_dir.display().to_string()));
        map
    }

    /// Source URL with placeholders substituted
    pub fn source_url(&self) -> Result<Option<String>> {
        match &self.source {
            Some(source) => Ok(Some(template::render(&source.url, &self.template_values())?)),
            None => Ok(None),
        }
    }

    /// File name of the source archive, the last URL segment
    pub fn archive_filename(&self) -> Result<Option<String>> {
        Ok(self.source_url()?.map(|url| {
            url.split('/')
                .next_back()
                .filter(|s| !s.is_empty())
                .unwrap_or("source.tar.gz")
                .to_string()
        }))
    }

    /// Directory the unpacked archive is expected to create
    pub fn source_subdir(&self) -> Result<String> {
        if let Some(subdir) = self.source.as_ref().and_then(|s| s.subdir.as_deref()) {
            return template::render(subdir, &self.template_values());
        }
        Ok(match self.version() {
            Some(version) => format!("{}-{}", self.package.name, version),
            None => self.package.name.clone(),
        })
    }

    /// Per-architecture build directory
    pub fn arch_build_dir(&self, arch_name: &str) -> PathBuf {
        self.build_dir.join(arch_name)
    }
}
