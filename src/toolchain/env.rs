// src/toolchain/env.rs

//! Child process environment composition
//!
//! The map handed to build steps is assembled from nothing: a handful of
//! host variables are copied by name, everything else is computed. Variables
//! such as `CFLAGS` or `MACOSX_DEPLOYMENT_TARGET` set in the invoking shell
//! therefore never reach a recipe.

use crate::flags::{self, Flag, FlagKind, GnuFlags};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Host variables copied into every build environment
pub const HOST_BASELINE: &[&str] = &["PATH", "HOME", "TMPDIR", "LANG"];

/// Host variables known to break cross builds when inherited
pub const SCRUBBED: &[&str] = &[
    "MACOSX_DEPLOYMENT_TARGET",
    "PYTHONDONTWRITEBYTECODE",
    "ARCHFLAGS",
    "CFLAGS",
    "LDFLAGS",
];

const CCACHE_DEFAULTS: &[(&str, &str)] = &[
    ("CCACHE_MAXSIZE", "10G"),
    ("CCACHE_HARDLINK", "true"),
    (
        "CCACHE_SLOPPINESS",
        "file_macro,time_macros,include_file_mtime,include_file_ctime,file_stat_matches",
    ),
];

/// Everything the environment map is computed from
#[derive(Debug)]
pub struct EnvInputs<'a> {
    pub host_env: &'a BTreeMap<String, String>,
    pub triple: &'a str,
    pub cc: &'a Path,
    pub cxx: &'a Path,
    pub ar: &'a Path,
    pub ld: &'a Path,
    pub ccache: Option<&'a Path>,
    /// Global flags already merged with the architecture's
    pub flags: &'a GnuFlags,
}

/// Build the variable map for one architecture
pub fn compose(inputs: &EnvInputs<'_>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    for name in HOST_BASELINE {
        if let Some(value) = inputs.host_env.get(*name) {
            env.insert(name.to_string(), value.clone());
        }
    }
    for name in SCRUBBED {
        if inputs.host_env.contains_key(*name) {
            debug!("not passing host {} to build steps", name);
        }
    }

    if let Some(ccache) = inputs.ccache {
        env.insert("USE_CCACHE".to_string(), "1".to_string());
        env.insert("CCACHE".to_string(), ccache.display().to_string());
        for (key, value) in inputs.host_env {
            if key.starts_with("CCACHE_") {
                env.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in CCACHE_DEFAULTS {
            env.entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    let includes: Vec<Flag> = inputs
        .flags
        .cppflags
        .iter()
        .filter(|f| f.kind() == FlagKind::Include)
        .cloned()
        .collect();
    let lib_paths: Vec<Flag> = inputs
        .flags
        .ldflags
        .iter()
        .filter(|f| f.kind() == FlagKind::LibraryPath)
        .cloned()
        .collect();

    let with_includes = |compile: &[Flag]| {
        let mut all = compile.to_vec();
        all.extend(includes.iter().cloned());
        flags::join(&all)
    };

    let vars = [
        ("CC", inputs.cc.display().to_string()),
        ("CXX", inputs.cxx.display().to_string()),
        ("AR", inputs.ar.display().to_string()),
        ("LD", inputs.ld.display().to_string()),
        ("HOST", inputs.triple.to_string()),
        ("OTHER_CFLAGS", flags::join(&includes)),
        ("OTHER_LDFLAGS", flags::join(&lib_paths)),
        ("CFLAGS", with_includes(&inputs.flags.cflags)),
        ("CXXFLAGS", with_includes(&inputs.flags.cxxflags)),
        ("CPPFLAGS", flags::join(&inputs.flags.cppflags)),
        ("LDFLAGS", flags::join(&inputs.flags.ldflags)),
        ("LDLIBS", flags::join(&inputs.flags.ldlibs)),
    ];
    for (key, value) in vars {
        env.insert(key.to_string(), value);
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> BTreeMap<String, String> {
        [
            ("PATH", "/usr/bin:/bin"),
            ("HOME", "/home/dev"),
            ("CFLAGS", "-march=native"),
            ("MACOSX_DEPLOYMENT_TARGET", "10.9"),
            ("ARCHFLAGS", "-arch x86_64"),
            ("CCACHE_MAXSIZE", "2G"),
            ("EDITOR", "vi"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn flags() -> GnuFlags {
        GnuFlags {
            cflags: vec![Flag::plain("-O3")],
            cxxflags: vec![Flag::plain("-O3")],
            cppflags: vec![Flag::include("/dist/include"), Flag::define("NDEBUG")],
            ldflags: vec![
                Flag::library_path("/dist/lib"),
                Flag::plain("-arch"),
                Flag::plain("arm64"),
            ],
            ldlibs: vec![Flag::library("z")],
        }
    }

    fn inputs<'a>(
        host: &'a BTreeMap<String, String>,
        flags: &'a GnuFlags,
        ccache: Option<&'a Path>,
    ) -> EnvInputs<'a> {
        EnvInputs {
            host_env: host,
            triple: "aarch64-apple-darwin13",
            cc: Path::new("/tmp/w/cc"),
            cxx: Path::new("/tmp/w/cxx"),
            ar: Path::new("/xc/ar"),
            ld: Path::new("/xc/ld"),
            ccache,
            flags,
        }
    }

    #[test]
    fn test_compose_without_ccache() {
        let host = host();
        let flags = flags();
        let env = compose(&inputs(&host, &flags, None));

        assert_eq!(env["CC"], "/tmp/w/cc");
        assert_eq!(env["HOST"], "aarch64-apple-darwin13");
        assert_eq!(env["CFLAGS"], "-O3 -I/dist/include");
        assert_eq!(env["CPPFLAGS"], "-I/dist/include -DNDEBUG");
        assert_eq!(env["OTHER_CFLAGS"], "-I/dist/include");
        assert_eq!(env["OTHER_LDFLAGS"], "-L/dist/lib");
        assert_eq!(env["LDFLAGS"], "-L/dist/lib -arch arm64");
        assert_eq!(env["LDLIBS"], "-lz");
        assert_eq!(env["PATH"], "/usr/bin:/bin");
        assert!(!env.contains_key("USE_CCACHE"));
        assert!(!env.contains_key("CCACHE_MAXSIZE"));
    }

    #[test]
    fn test_host_variables_do_not_leak() {
        let host = host();
        let flags = flags();
        let env = compose(&inputs(&host, &flags, None));

        assert!(!env.contains_key("EDITOR"));
        assert!(!env.contains_key("MACOSX_DEPLOYMENT_TARGET"));
        assert!(!env.contains_key("ARCHFLAGS"));
        assert_ne!(env["CFLAGS"], "-march=native");
    }

    #[test]
    fn test_ccache_variables() {
        let host = host();
        let flags = flags();
        let env = compose(&inputs(&host, &flags, Some(Path::new("/usr/bin/ccache"))));

        assert_eq!(env["USE_CCACHE"], "1");
        assert_eq!(env["CCACHE"], "/usr/bin/ccache");
        // inherited value wins over the default
        assert_eq!(env["CCACHE_MAXSIZE"], "2G");
        assert_eq!(env["CCACHE_HARDLINK"], "true");
        assert!(env["CCACHE_SLOPPINESS"].contains("time_macros"));
    }
}
