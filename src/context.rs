// src/context.rs

//! Build context and configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML config
//! file, then command line overrides. Directory settings may reference each
//! other with `{placeholder}`s (`cachedir = "{builddir}/cache"`), so the
//! merged layers are run through the template resolver before the
//! [`BuildContext`] is frozen.
//!
//! # Config file
//!
//! ```toml
//! builddir = "{workdir}/out"
//! custom_recipes = ["/home/me/recipes"]
//! cflags = ["-g"]
//! defines = ["NDEBUG"]
//! jobs = 8
//! use_ccache = false
//! ```

use crate::error::{Error, Result};
use crate::flags::{Flag, GnuFlags};
use crate::template::{self, TemplateMap};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the per-project config file looked up in the workdir
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// File name of the build-state document under the prefix
pub const STATE_FILE_NAME: &str = "state.db";

/// Minimum OS version passed to the compiler when none is configured
pub const DEFAULT_MIN_OS_VERSION: &str = "9.0";

/// Recipes shipped with kiln
pub const BUILTIN_RECIPES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/recipes");

/// One configuration layer; every field is optional so layers can be merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KilnConfig {
    pub builddir: Option<String>,
    pub cachedir: Option<String>,
    pub prefix: Option<String>,
    pub recipes_dir: Option<String>,
    pub custom_recipes: Option<Vec<String>>,
    pub cflags: Option<Vec<String>>,
    pub cxxflags: Option<Vec<String>>,
    pub includes: Option<Vec<String>>,
    pub defines: Option<Vec<String>>,
    pub ldflags: Option<Vec<String>>,
    pub ldlibs: Option<Vec<String>>,
    pub jobs: Option<usize>,
    pub use_ccache: Option<bool>,
    pub dedup_flags: Option<bool>,
    pub min_os_version: Option<String>,
    /// Recipes every build is assumed to have available
    pub implicit_dependencies: Option<Vec<String>>,
}

impl KilnConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: KilnConfig) -> KilnConfig {
        KilnConfig {
            builddir: other.builddir.or(self.builddir),
            cachedir: other.cachedir.or(self.cachedir),
            prefix: other.prefix.or(self.prefix),
            recipes_dir: other.recipes_dir.or(self.recipes_dir),
            custom_recipes: other.custom_recipes.or(self.custom_recipes),
            cflags: other.cflags.or(self.cflags),
            cxxflags: other.cxxflags.or(self.cxxflags),
            includes: other.includes.or(self.includes),
            defines: other.defines.or(self.defines),
            ldflags: other.ldflags.or(self.ldflags),
            ldlibs: other.ldlibs.or(self.ldlibs),
            jobs: other.jobs.or(self.jobs),
            use_ccache: other.use_ccache.or(self.use_ccache),
            dedup_flags: other.dedup_flags.or(self.dedup_flags),
            min_os_version: other.min_os_version.or(self.min_os_version),
            implicit_dependencies: other.implicit_dependencies.or(self.implicit_dependencies),
        }
    }

    /// Built-in defaults layer
    pub fn defaults() -> Self {
        Self {
            builddir: Some("{workdir}/build".to_string()),
            cachedir: Some("{builddir}/cache".to_string()),
            prefix: Some("{workdir}/dist".to_string()),
            recipes_dir: Some(BUILTIN_RECIPES_DIR.to_string()),
            custom_recipes: Some(Vec::new()),
            cflags: Some(Vec::new()),
            cxxflags: Some(Vec::new()),
            includes: Some(vec!["{prefix}/include".to_string()]),
            defines: Some(Vec::new()),
            ldflags: Some(vec!["{prefix}/lib".to_string()]),
            ldlibs: Some(Vec::new()),
            jobs: Some(num_cpus()),
            use_ccache: Some(true),
            dedup_flags: Some(false),
            min_os_version: Some(DEFAULT_MIN_OS_VERSION.to_string()),
            implicit_dependencies: Some(vec!["python".to_string()]),
        }
    }
}

/// Inputs to [`BuildContext::new`]: where to work and what to override
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub workdir: PathBuf,
    /// Explicit config file; it is an error if it does not exist
    pub config_file: Option<PathBuf>,
    /// Look in the user config dir when no other file is found
    pub user_config: bool,
    /// Command line layer
    pub overrides: KilnConfig,
    /// Snapshot of the host environment
    pub host_env: BTreeMap<String, String>,
    /// Where per-architecture wrapper directories are created
    pub tmp_root: PathBuf,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            workdir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            user_config: true,
            overrides: KilnConfig::default(),
            host_env: std::env::vars().collect(),
            tmp_root: std::env::temp_dir(),
        }
    }
}

impl ContextOptions {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_user_config(mut self, enabled: bool) -> Self {
        self.user_config = enabled;
        self
    }

    pub fn with_overrides(mut self, overrides: KilnConfig) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_host_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.host_env = env;
        self
    }

    pub fn with_tmp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_root = path.into();
        self
    }

    /// Config file to load, if any
    fn locate_config(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.config_file {
            if !path.is_file() {
                return Err(Error::ConfigError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        let local = self.workdir.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Ok(Some(local));
        }

        if self.user_config {
            if let Some(dir) = dirs::config_dir() {
                let user = dir.join("kiln").join("config.toml");
                if user.is_file() {
                    return Ok(Some(user));
                }
            }
        }

        Ok(None)
    }
}

/// Resolved, immutable settings shared by every part of a run
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub workdir: PathBuf,
    pub builddir: PathBuf,
    pub cachedir: PathBuf,
    pub prefix: PathBuf,
    pub recipes_dir: PathBuf,
    pub custom_recipes: Vec<PathBuf>,
    /// Global flags, merged in front of per-architecture flags
    pub gnuflags: GnuFlags,
    pub jobs: usize,
    pub use_ccache: bool,
    pub dedup_flags: bool,
    pub min_os_version: String,
    pub implicit_dependencies: Vec<String>,
    pub host_env: BTreeMap<String, String>,
    pub tmp_root: PathBuf,
    /// Config file that contributed to this context
    pub config_file: Option<PathBuf>,
}

impl BuildContext {
    /// Merge the configuration layers and resolve placeholders
    pub fn new(options: ContextOptions) -> Result<Self> {
        let config_file = options.locate_config()?;
        let file_layer = match &config_file {
            Some(path) => {
                info!("Using config file {}", path.display());
                KilnConfig::load(path)?
            }
            None => KilnConfig::default(),
        };

        let config = KilnConfig::defaults()
            .merge(file_layer)
            .merge(options.overrides.clone());

        let resolved = template::resolve(&template_map(&options.workdir, &config))?;
        debug!("resolved context: {:?}", resolved);

        let path = |key: &str| -> Result<PathBuf> { Ok(PathBuf::from(string_of(&resolved, key)?)) };
        let list = |key: &str| list_of(&resolved, key);

        let gnuflags = GnuFlags {
            cflags: list("cflags")?.into_iter().map(Flag::plain).collect(),
            cxxflags: list("cxxflags")?.into_iter().map(Flag::plain).collect(),
            cppflags: list("includes")?
                .into_iter()
                .map(Flag::include)
                .chain(list("defines")?.into_iter().map(|d| Flag::parse_define(&d)))
                .collect(),
            ldflags: list("ldflags")?.into_iter().map(Flag::library_path).collect(),
            ldlibs: list("ldlibs")?.into_iter().map(Flag::library).collect(),
        };

        let ccache_disabled_by_env = options
            .host_env
            .get("USE_CCACHE")
            .is_some_and(|v| v == "0");

        Ok(Self {
            workdir: options.workdir.clone(),
            builddir: path("builddir")?,
            cachedir: path("cachedir")?,
            prefix: path("prefix")?,
            recipes_dir: path("recipes_dir")?,
            custom_recipes: list("custom_recipes")?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            gnuflags,
            jobs: config.jobs.unwrap_or_else(num_cpus).max(1),
            use_ccache: config.use_ccache.unwrap_or(true) && !ccache_disabled_by_env,
            dedup_flags: config.dedup_flags.unwrap_or(false),
            min_os_version: config
                .min_os_version
                .unwrap_or_else(|| DEFAULT_MIN_OS_VERSION.to_string()),
            implicit_dependencies: config.implicit_dependencies.unwrap_or_default(),
            host_env: options.host_env,
            tmp_root: options.tmp_root,
            config_file,
        })
    }

    /// Path of the build-state document
    pub fn state_path(&self) -> PathBuf {
        self.prefix.join(STATE_FILE_NAME)
    }

    /// Where source archives are downloaded
    pub fn downloads_dir(&self) -> PathBuf {
        self.cachedir.join("downloads")
    }

    /// Recipe search path: built-in directory first, then custom ones
    pub fn recipe_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.recipes_dir.clone())
            .chain(self.custom_recipes.iter().cloned())
            .collect()
    }

    /// Context values exposed to recipe command templates
    pub fn template_values(&self) -> TemplateMap {
        let mut map = TemplateMap::new();
        map.insert("workdir".into(), json!(self.workdir.display().to_string()));
        map.insert("builddir".into(), json!(self.builddir.display().to_string()));
        map.insert("cachedir".into(), json!(self.cachedir.display().to_string()));
        map.insert("prefix".into(), json!(self.prefix.display().to_string()));
        map.insert("jobs".into(), json!(self.jobs));
        map.insert("make_jobs".into(), json!(format!("-j{}", self.jobs)));
        map
    }
}

fn template_map(workdir: &Path, config: &KilnConfig) -> TemplateMap {
    let mut map = TemplateMap::new();
    map.insert("workdir".into(), json!(workdir.display().to_string()));

    let strings = [
        ("builddir", &config.builddir),
        ("cachedir", &config.cachedir),
        ("prefix", &config.prefix),
        ("recipes_dir", &config.recipes_dir),
    ];
    for (key, value) in strings {
        map.insert(key.into(), json!(value.clone().unwrap_or_default()));
    }

    let lists = [
        ("custom_recipes", &config.custom_recipes),
        ("cflags", &config.cflags),
        ("cxxflags", &config.cxxflags),
        ("includes", &config.includes),
        ("defines", &config.defines),
        ("ldflags", &config.ldflags),
        ("ldlibs", &config.ldlibs),
    ];
    for (key, value) in lists {
        map.insert(key.into(), json!(value.clone().unwrap_or_default()));
    }

    map
}

fn string_of(map: &TemplateMap, key: &str) -> Result<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(Error::ConfigError(format!("'{}' is not set", key))),
    }
}

fn list_of(map: &TemplateMap, key: &str) -> Result<Vec<String>> {
    match map.get(key) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()),
        None => Ok(Vec::new()),
        Some(other) => Err(Error::ConfigError(format!(
            "'{}' must be a list, got {}",
            key, other
        ))),
    }
}

/// Number of CPUs for parallel make
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::join;
    use tempfile::tempdir;

    fn options(workdir: &Path) -> ContextOptions {
        ContextOptions::new(workdir)
            .with_user_config(false)
            .with_host_env(BTreeMap::new())
    }

    #[test]
    fn test_default_layout() {
        let ctx = BuildContext::new(options(Path::new("/w"))).unwrap();
        assert_eq!(ctx.builddir, PathBuf::from("/w/build"));
        assert_eq!(ctx.cachedir, PathBuf::from("/w/build/cache"));
        assert_eq!(ctx.prefix, PathBuf::from("/w/dist"));
        assert_eq!(ctx.state_path(), PathBuf::from("/w/dist/state.db"));
        assert_eq!(ctx.downloads_dir(), PathBuf::from("/w/build/cache/downloads"));
        assert_eq!(join(&ctx.gnuflags.cppflags), "-I/w/dist/include");
        assert_eq!(join(&ctx.gnuflags.ldflags), "-L/w/dist/lib");
        assert!(ctx.use_ccache);
        assert!(!ctx.dedup_flags);
        assert_eq!(ctx.implicit_dependencies, vec!["python".to_string()]);
    }

    #[test]
    fn test_overrides_resolve_against_each_other() {
        let overrides = KilnConfig {
            builddir: Some("/tmp/b".to_string()),
            prefix: Some("{builddir}/out".to_string()),
            defines: Some(vec!["NDEBUG".to_string(), "LEVEL=2".to_string()]),
            ..Default::default()
        };
        let ctx = BuildContext::new(options(Path::new("/w")).with_overrides(overrides)).unwrap();

        assert_eq!(ctx.cachedir, PathBuf::from("/tmp/b/cache"));
        assert_eq!(ctx.prefix, PathBuf::from("/tmp/b/out"));
        assert_eq!(
            join(&ctx.gnuflags.cppflags),
            "-I/tmp/b/out/include -DNDEBUG -DLEVEL=2"
        );
    }

    #[test]
    fn test_workdir_config_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "cachedir = \"/var/cache/kiln\"\njobs = 3\ncflags = [\"-g\"]\n",
        )
        .unwrap();

        let ctx = BuildContext::new(options(dir.path())).unwrap();
        assert_eq!(ctx.cachedir, PathBuf::from("/var/cache/kiln"));
        assert_eq!(ctx.jobs, 3);
        assert_eq!(join(&ctx.gnuflags.cflags), "-g");
        assert_eq!(ctx.config_file, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_cli_layer_beats_config_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        fs::write(&file, "jobs = 3\n").unwrap();

        let overrides = KilnConfig {
            jobs: Some(12),
            ..Default::default()
        };
        let ctx = BuildContext::new(
            options(dir.path())
                .with_config_file(&file)
                .with_overrides(overrides),
        )
        .unwrap();
        assert_eq!(ctx.jobs, 12);
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let err = BuildContext::new(
            options(Path::new("/w")).with_config_file("/nonexistent/kiln.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_unknown_config_key_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "bogus = 1\n").unwrap();
        let err = BuildContext::new(options(dir.path())).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_use_ccache_env_disables_cache() {
        let env = BTreeMap::from([("USE_CCACHE".to_string(), "0".to_string())]);
        let ctx = BuildContext::new(options(Path::new("/w")).with_host_env(env)).unwrap();
        assert!(!ctx.use_ccache);
    }

    #[test]
    fn test_cyclic_directories_rejected() {
        let overrides = KilnConfig {
            builddir: Some("{prefix}/b".to_string()),
            prefix: Some("{builddir}/p".to_string()),
            ..Default::default()
        };
        let err = BuildContext::new(options(Path::new("/w")).with_overrides(overrides)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_recipe_paths_order() {
        let overrides = KilnConfig {
            recipes_dir: Some("/builtin".to_string()),
            custom_recipes: Some(vec!["/a".to_string(), "{workdir}/mine".to_string()]),
            ..Default::default()
        };
        let ctx = BuildContext::new(options(Path::new("/w")).with_overrides(overrides)).unwrap();
        assert_eq!(
            ctx.recipe_paths(),
            vec![
                PathBuf::from("/builtin"),
                PathBuf::from("/a"),
                PathBuf::from("/w/mine")
            ]
        );
    }
}
