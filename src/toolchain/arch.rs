// src/toolchain/arch.rs

//! Supported compile targets

use crate::error::{Error, Result};
use crate::flags::{Flag, GnuFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// SDK name of physical devices
pub const DEVICE_SDK: &str = "iphoneos";

/// SDK name of the simulator
pub const SIMULATOR_SDK: &str = "iphonesimulator";

/// `(sdk, cpu, triple)` for every target kiln can build
pub const SUPPORTED: &[(&str, &str, &str)] = &[
    (DEVICE_SDK, "arm64", "aarch64-apple-darwin13"),
    (SIMULATOR_SDK, "x86_64", "x86_64-apple-darwin13"),
    (SIMULATOR_SDK, "arm64", "aarch64-apple-darwin13"),
];

/// A single (platform, CPU) compile target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Architecture {
    pub sdk: String,
    pub cpu: String,
    pub triple: String,
    pub min_os_flag: String,
}

impl Architecture {
    /// Look up a supported target
    ///
    /// Unsupported combinations are a configuration error.
    pub fn lookup(sdk: &str, cpu: &str, min_os_version: &str) -> Result<Self> {
        let (sdk, cpu, triple) = SUPPORTED
            .iter()
            .find(|(s, c, _)| *s == sdk && *c == cpu)
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "unsupported platform, arch ({}, {}); supported: {}",
                    sdk,
                    cpu,
                    SUPPORTED
                        .iter()
                        .map(|(s, c, _)| format!("{}/{}", s, c))
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        let min_os_flag = if *sdk == DEVICE_SDK {
            format!("-miphoneos-version-min={}", min_os_version)
        } else {
            format!("-mios-simulator-version-min={}", min_os_version)
        };

        Ok(Self {
            sdk: sdk.to_string(),
            cpu: cpu.to_string(),
            triple: triple.to_string(),
            min_os_flag,
        })
    }

    /// All supported targets
    pub fn supported(min_os_version: &str) -> Vec<Self> {
        SUPPORTED
            .iter()
            .filter_map(|(sdk, cpu, _)| Self::lookup(sdk, cpu, min_os_version).ok())
            .collect()
    }

    pub fn is_device(&self) -> bool {
        self.sdk == DEVICE_SDK
    }

    /// `<sdk>-<cpu>`, used for directory and state key names
    pub fn name(&self) -> String {
        format!("{}-{}", self.sdk, self.cpu)
    }

    /// Flags baked into the compiler wrappers
    pub fn baseline_flags(&self, sysroot: &Path) -> Vec<Flag> {
        vec![
            Flag::plain("--sysroot"),
            Flag::plain(sysroot.display().to_string()),
            Flag::plain("-arch"),
            Flag::plain(self.cpu.clone()),
            Flag::plain("-pipe"),
            Flag::plain("-no-cpp-precomp"),
        ]
    }

    /// Architecture specific flags, merged after the global ones
    pub fn local_flags(&self, sysroot: &Path, prefix: &Path) -> GnuFlags {
        let mut compile = vec![Flag::plain("-O3"), Flag::plain(self.min_os_flag.clone())];
        if self.is_device() {
            compile.push(Flag::plain("-fembed-bitcode"));
        }

        GnuFlags {
            cflags: compile.clone(),
            cxxflags: compile,
            cppflags: vec![Flag::include(
                prefix.join("include").join(&self.cpu).display().to_string(),
            )],
            ldflags: vec![
                Flag::plain("-arch"),
                Flag::plain(self.cpu.clone()),
                Flag::library_path(sysroot.join("usr/lib").display().to_string()),
                Flag::plain(self.min_os_flag.clone()),
            ],
            ldlibs: Vec::new(),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::join;

    #[test]
    fn test_lookup_device() {
        let arch = Architecture::lookup("iphoneos", "arm64", "9.0").unwrap();
        assert_eq!(arch.triple, "aarch64-apple-darwin13");
        assert_eq!(arch.min_os_flag, "-miphoneos-version-min=9.0");
        assert!(arch.is_device());
        assert_eq!(arch.name(), "iphoneos-arm64");
    }

    #[test]
    fn test_lookup_simulator() {
        let arch = Architecture::lookup("iphonesimulator", "x86_64", "12.0").unwrap();
        assert_eq!(arch.triple, "x86_64-apple-darwin13");
        assert_eq!(arch.min_os_flag, "-mios-simulator-version-min=12.0");
        assert!(!arch.is_device());
    }

    #[test]
    fn test_unsupported_pair() {
        let err = Architecture::lookup("iphoneos", "x86_64", "9.0").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("(iphoneos, x86_64)"));
    }

    #[test]
    fn test_supported_table() {
        let all = Architecture::supported("9.0");
        assert_eq!(all.len(), SUPPORTED.len());
    }

    #[test]
    fn test_bitcode_only_on_device() {
        let sysroot = Path::new("/sdk");
        let prefix = Path::new("/dist");

        let device = Architecture::lookup("iphoneos", "arm64", "9.0").unwrap();
        assert!(join(&device.local_flags(sysroot, prefix).cflags).contains("-fembed-bitcode"));

        let sim = Architecture::lookup("iphonesimulator", "arm64", "9.0").unwrap();
        let flags = sim.local_flags(sysroot, prefix);
        assert!(!join(&flags.cflags).contains("-fembed-bitcode"));
        assert_eq!(join(&flags.cppflags), "-I/dist/include/arm64");
        assert_eq!(
            join(&flags.ldflags),
            "-arch arm64 -L/sdk/usr/lib -mios-simulator-version-min=9.0"
        );
    }

    #[test]
    fn test_baseline_flags() {
        let arch = Architecture::lookup("iphoneos", "arm64", "9.0").unwrap();
        assert_eq!(
            join(&arch.baseline_flags(Path::new("/sdk"))),
            "--sysroot /sdk -arch arm64 -pipe -no-cpp-precomp"
        );
    }
}
