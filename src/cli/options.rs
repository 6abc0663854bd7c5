// src/cli/options.rs
//! Options shared by every subcommand

use clap::{ArgAction, Args};
use kiln::{ContextOptions, KilnConfig};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Working directory; relative defaults are resolved against it
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Where recipes are unpacked and built
    #[arg(long, global = true)]
    pub builddir: Option<String>,

    /// Where downloads are cached
    #[arg(long, global = true)]
    pub cachedir: Option<String>,

    /// Distribution prefix for headers, libraries and build state
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Directory of built-in recipes
    #[arg(long, global = true)]
    pub recipes_dir: Option<String>,

    /// Additional recipe directory (repeatable)
    #[arg(long = "custom-recipes", global = true)]
    pub custom_recipes: Vec<String>,

    /// Extra C compiler flag (repeatable)
    #[arg(long = "cflag", global = true, allow_hyphen_values = true)]
    pub cflags: Vec<String>,

    /// Extra C++ compiler flag (repeatable)
    #[arg(long = "cxxflag", global = true, allow_hyphen_values = true)]
    pub cxxflags: Vec<String>,

    /// Include directory (repeatable)
    #[arg(short = 'I', long = "include", global = true)]
    pub includes: Vec<String>,

    /// Preprocessor define, NAME or NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "define", global = true)]
    pub defines: Vec<String>,

    /// Library search directory (repeatable)
    #[arg(short = 'L', long = "ldflag", global = true)]
    pub ldflags: Vec<String>,

    /// Library to link (repeatable)
    #[arg(long = "ldlib", global = true)]
    pub ldlibs: Vec<String>,

    /// Parallel make jobs (default: number of CPUs)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Do not route compilers through ccache
    #[arg(long, global = true)]
    pub no_ccache: bool,

    /// Drop repeated flags when merging flag sets
    #[arg(long, global = true)]
    pub dedup_flags: bool,

    /// Config file (default: <workdir>/kiln.toml, then the user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output (-q warnings, -qq errors only)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

impl GlobalArgs {
    /// Command line configuration layer; unset options leave lower layers alone
    pub fn overrides(&self) -> KilnConfig {
        KilnConfig {
            builddir: self.builddir.clone(),
            cachedir: self.cachedir.clone(),
            prefix: self.prefix.clone(),
            recipes_dir: self.recipes_dir.clone(),
            custom_recipes: non_empty(&self.custom_recipes),
            cflags: non_empty(&self.cflags),
            cxxflags: non_empty(&self.cxxflags),
            includes: non_empty(&self.includes),
            defines: non_empty(&self.defines),
            ldflags: non_empty(&self.ldflags),
            ldlibs: non_empty(&self.ldlibs),
            jobs: self.jobs,
            use_ccache: self.no_ccache.then_some(false),
            dedup_flags: self.dedup_flags.then_some(true),
            min_os_version: None,
            implicit_dependencies: None,
        }
    }

    pub fn context_options(&self) -> ContextOptions {
        let mut options = match &self.workdir {
            Some(dir) => ContextOptions::new(dir),
            None => ContextOptions::default(),
        }
        .with_overrides(self.overrides());

        if let Some(path) = &self.config {
            options = options.with_config_file(path);
        }
        options
    }

    /// Log filter derived from the -v/-q counts
    pub fn log_level(&self) -> &'static str {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            i16::MIN..=-2 => "error",
            -1 => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
