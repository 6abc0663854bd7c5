// src/sdk.rs

//! Platform SDK queries and host prerequisites
//!
//! The toolchain builder never hardcodes compiler paths. It asks a
//! [`ToolLocator`] where a tool lives for a given SDK; the production
//! implementation shells out to `xcrun` and `xcodebuild`.

use crate::error::{Error, Result};
use crate::shell::{RunFlags, Shell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Host tools a build cannot run without
pub const REQUIRED_HOST_TOOLS: &[&str] = &["pkg-config", "autoconf", "automake", "libtool"];

/// Host tools that are used when present
pub const OPTIONAL_HOST_TOOLS: &[&str] = &["ccache", "cython", "pigz", "pbzip2"];

/// One entry of `xcodebuild -showsdks -json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkInfo {
    pub canonical_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub sdk_version: String,
}

/// Tool-location service of the platform
pub trait ToolLocator {
    /// Absolute path of `tool` inside `sdk`
    fn find_tool(&self, sdk: &str, tool: &str) -> Result<PathBuf>;

    /// Absolute path of the SDK root, used as sysroot
    fn sdk_path(&self, sdk: &str) -> Result<PathBuf>;

    /// SDKs installed on this host
    fn list_sdks(&self) -> Result<Vec<SdkInfo>>;
}

/// [`ToolLocator`] backed by Xcode's command line tools
#[derive(Debug, Clone, Default)]
pub struct Xcrun {
    shell: Shell,
}

impl Xcrun {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    fn query(&self, sdk: &str, tool: &str, args: &[&str]) -> Result<PathBuf> {
        let output = match self.shell.run("xcrun", args, RunFlags::STRIP) {
            Ok(output) => output,
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        match output {
            Some(path) if !path.is_empty() => {
                debug!("xcrun: {} for {} is {}", tool, sdk, path);
                Ok(PathBuf::from(path))
            }
            _ => Err(Error::ToolNotFound {
                sdk: sdk.to_string(),
                tool: tool.to_string(),
            }),
        }
    }
}

impl ToolLocator for Xcrun {
    fn find_tool(&self, sdk: &str, tool: &str) -> Result<PathBuf> {
        self.query(sdk, tool, &["-find", "-sdk", sdk, tool])
    }

    fn sdk_path(&self, sdk: &str) -> Result<PathBuf> {
        self.query(sdk, "sysroot", &["--sdk", sdk, "--show-sdk-path"])
    }

    fn list_sdks(&self) -> Result<Vec<SdkInfo>> {
        let value = self
            .shell
            .run_json("xcodebuild", &["-showsdks", "-json"], RunFlags::DEFAULT)?
            .unwrap_or_default();
        serde_json::from_value(value).map_err(Error::from)
    }
}

/// Result of probing the host for build prerequisites
#[derive(Debug, Clone, Default)]
pub struct Prerequisites {
    found: BTreeMap<String, Option<PathBuf>>,
}

impl Prerequisites {
    /// Look up every required and optional host tool
    pub fn check(shell: &Shell) -> Self {
        let found = REQUIRED_HOST_TOOLS
            .iter()
            .chain(OPTIONAL_HOST_TOOLS)
            .map(|tool| (tool.to_string(), shell.which(tool)))
            .collect();
        Self { found }
    }

    pub fn path(&self, tool: &str) -> Option<&PathBuf> {
        self.found.get(tool).and_then(Option::as_ref)
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_HOST_TOOLS
            .iter()
            .copied()
            .filter(|tool| self.path(tool).is_none())
            .collect()
    }

    /// Log the probe and fail on the first missing required tool
    pub fn ensure(&self) -> Result<()> {
        for tool in OPTIONAL_HOST_TOOLS {
            match self.path(tool) {
                Some(path) => debug!("optional tool {} at {}", tool, path.display()),
                None => info!("optional tool {} not found", tool),
            }
        }

        let missing = self.missing_required();
        if let Some(tool) = missing.first() {
            warn!("missing required host tools: {}", missing.join(", "));
            return Err(Error::ToolNotFound {
                sdk: "host".to_string(),
                tool: tool.to_string(),
            });
        }
        Ok(())
    }

    /// `(tool, path)` pairs in a stable order, required tools first
    pub fn report(&self) -> Vec<(&'static str, Option<&PathBuf>)> {
        REQUIRED_HOST_TOOLS
            .iter()
            .chain(OPTIONAL_HOST_TOOLS)
            .map(|tool| (*tool, self.path(tool)))
            .collect()
    }
}
