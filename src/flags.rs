// src/flags.rs

//! Typed compiler and linker flags
//!
//! A [`Flag`] is a single command-line token made of a fixed prefix, a key
//! and an optional value. Rendering is `prefix + key` when there is no value
//! and `prefix + key + "=" + value` otherwise:
//!
//! ```
//! use kiln::flags::Flag;
//!
//! assert_eq!(Flag::include("/abc/def").to_string(), "-I/abc/def");
//! assert_eq!(Flag::define_value("A", "1").to_string(), "-DA=1");
//! assert_eq!(Flag::library("m").to_string(), "-lm");
//! ```
//!
//! Equality and hashing are structural so merged global and per-arch flag
//! lists can be deduplicated when asked to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Category of a flag, which fixes its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// Verbatim token (`-O3`, `-pipe`, `--sysroot`)
    Plain,
    /// Header search path (`-I`)
    Include,
    /// Library search path (`-L`)
    LibraryPath,
    /// Preprocessor define (`-D`)
    Define,
    /// Library to link (`-l`)
    Library,
}

impl FlagKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Include => "-I",
            Self::LibraryPath => "-L",
            Self::Define => "-D",
            Self::Library => "-l",
        }
    }
}

/// A typed, immutable compiler/linker argument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flag {
    kind: FlagKind,
    key: String,
    value: Option<String>,
}

impl Flag {
    pub fn new(kind: FlagKind, key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            value,
        }
    }

    pub fn plain(token: impl Into<String>) -> Self {
        Self::new(FlagKind::Plain, token, None)
    }

    pub fn include(path: impl Into<String>) -> Self {
        Self::new(FlagKind::Include, path, None)
    }

    pub fn library_path(path: impl Into<String>) -> Self {
        Self::new(FlagKind::LibraryPath, path, None)
    }

    pub fn define(name: impl Into<String>) -> Self {
        Self::new(FlagKind::Define, name, None)
    }

    pub fn define_value(name: impl Into<String>, value: impl ToString) -> Self {
        Self::new(FlagKind::Define, name, Some(value.to_string()))
    }

    pub fn library(name: impl Into<String>) -> Self {
        Self::new(FlagKind::Library, name, None)
    }

    /// Parse a `NAME` or `NAME=VALUE` define as given on the command line
    pub fn parse_define(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((name, value)) => Self::define_value(name, value),
            None => Self::define(spec),
        }
    }

    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}{}={}", self.kind.prefix(), self.key, value),
            None => write!(f, "{}{}", self.kind.prefix(), self.key),
        }
    }
}

/// Render a flag list as a single space separated string
pub fn join(flags: &[Flag]) -> String {
    flags
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merge global flags with local ones, global first
///
/// Repeated flags are kept unless `dedup` is set, in which case only the
/// first occurrence of structurally equal flags survives.
pub fn merge(global: &[Flag], local: &[Flag], dedup: bool) -> Vec<Flag> {
    let merged = global.iter().chain(local.iter()).cloned();
    if !dedup {
        return merged.collect();
    }

    let mut seen = HashSet::new();
    merged.filter(|flag| seen.insert(flag.clone())).collect()
}

/// The GNU implicit make variables, as typed flag lists
///
/// `cflags` and `cxxflags` hold plain tokens, `cppflags` include paths and
/// defines, `ldflags` library search paths, `ldlibs` libraries to link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnuFlags {
    pub cflags: Vec<Flag>,
    pub cxxflags: Vec<Flag>,
    pub cppflags: Vec<Flag>,
    pub ldflags: Vec<Flag>,
    pub ldlibs: Vec<Flag>,
}

impl GnuFlags {
    /// Combine `self` (global) with `local`, list by list
    pub fn merged(&self, local: &GnuFlags, dedup: bool) -> GnuFlags {
        GnuFlags {
            cflags: merge(&self.cflags, &local.cflags, dedup),
            cxxflags: merge(&self.cxxflags, &local.cxxflags, dedup),
            cppflags: merge(&self.cppflags, &local.cppflags, dedup),
            ldflags: merge(&self.ldflags, &local.ldflags, dedup),
            ldlibs: merge(&self.ldlibs, &local.ldlibs, dedup),
        }
    }
}
