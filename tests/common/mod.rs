// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use kiln::{
    BuildContext, ContextOptions, Error, Invocation, KilnConfig, ProcessRunner, RawOutput, Result,
    SdkInfo, Shell, ToolLocator,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Stand-in for the host: records every invocation and never spawns anything.
#[derive(Default)]
pub struct FakeHost {
    calls: Mutex<Vec<Invocation>>,
    /// Tools `locate` reports as missing
    missing: BTreeSet<String>,
    /// Command lines containing this text exit with status 2
    fail_on: Option<String>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn without(tools: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: tools.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        })
    }

    pub fn failing_on(text: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// The `sh -c` scripts run so far, in order
    pub fn scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == "sh")
            .filter_map(|c| c.args.get(1).cloned())
            .collect()
    }
}

impl ProcessRunner for FakeHost {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let failed = self
            .fail_on
            .as_ref()
            .is_some_and(|text| invocation.command_line().contains(text.as_str()));

        Ok(RawOutput {
            stdout: String::new(),
            stderr: if failed { "boom".to_string() } else { String::new() },
            code: Some(if failed { 2 } else { 0 }),
        })
    }

    fn locate(&self, tool: &str) -> Option<PathBuf> {
        if self.missing.contains(tool) {
            None
        } else {
            Some(PathBuf::from("/usr/local/bin").join(tool))
        }
    }
}

/// Platform SDK with every tool present under a fixed layout.
#[derive(Default)]
pub struct FakeXcode {
    /// SDKs that report no tools at all
    pub broken: BTreeSet<String>,
}

impl ToolLocator for FakeXcode {
    fn find_tool(&self, sdk: &str, tool: &str) -> Result<PathBuf> {
        if self.broken.contains(sdk) {
            return Err(Error::ToolNotFound {
                sdk: sdk.to_string(),
                tool: tool.to_string(),
            });
        }
        Ok(PathBuf::from("/Xcode/Toolchain/usr/bin").join(tool))
    }

    fn sdk_path(&self, sdk: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/Xcode/SDKs/{}.sdk", sdk)))
    }

    fn list_sdks(&self) -> Result<Vec<SdkInfo>> {
        Ok(vec![SdkInfo {
            canonical_name: "iphoneos17.0".to_string(),
            display_name: "iOS 17.0".to_string(),
            platform: "iphoneos".to_string(),
            sdk_version: "17.0".to_string(),
        }])
    }
}

/// Write `<root>/<name>/recipe.toml`
pub fn write_recipe(root: &Path, name: &str, toml: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("recipe.toml"), toml).unwrap();
    dir
}

/// A recipe with one `make` step and the given dependencies
pub fn simple_recipe(name: &str, depends: &[&str]) -> String {
    let depends: Vec<String> = depends.iter().map(|d| format!("\"{}\"", d)).collect();
    format!(
        "[package]\nname = \"{name}\"\nversion = \"1.0\"\ndepends = [{}]\n\n\
         [build]\nmake = \"make {{make_jobs}} CC={{cc}} # {name} {{arch}}\"\n",
        depends.join(", ")
    )
}

/// Scratch workspace with a recipes directory and a resolved context
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("recipes")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn recipes(&self) -> PathBuf {
        self.path().join("recipes")
    }

    pub fn tmp_root(&self) -> PathBuf {
        self.path().join("tmp")
    }

    pub fn add(&self, name: &str, depends: &[&str]) -> PathBuf {
        write_recipe(&self.recipes(), name, &simple_recipe(name, depends))
    }

    pub fn options(&self) -> ContextOptions {
        let host_env = BTreeMap::from([
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("HOME".to_string(), "/home/builder".to_string()),
            ("SECRET_TOKEN".to_string(), "hunter2".to_string()),
        ]);
        ContextOptions::new(self.path())
            .with_user_config(false)
            .with_host_env(host_env)
            .with_tmp_root(self.tmp_root())
            .with_overrides(KilnConfig {
                recipes_dir: Some(self.recipes().display().to_string()),
                jobs: Some(4),
                ..Default::default()
            })
    }

    pub fn context(&self) -> BuildContext {
        BuildContext::new(self.options()).unwrap()
    }
}

pub fn shell(host: &Arc<FakeHost>) -> Shell {
    Shell::new(Arc::clone(host) as Arc<dyn ProcessRunner>)
}
