// src/toolchain/wrapper.rs

//! Compiler wrapper scripts
//!
//! Many `configure` scripts run the compiler for feature probes (`$CC -E`)
//! without forwarding `CFLAGS`, which breaks cross builds. Flags that must
//! always be present are therefore baked into tiny shell scripts that stand
//! in for `CC` and `CXX`:
//!
//! ```sh
//! #!/bin/sh
//! /usr/bin/ccache /path/to/clang --sysroot /sdk -arch arm64 -pipe -no-cpp-precomp "$@"
//! ```
//!
//! The scripts live in a temporary directory removed when the
//! [`CompilerWrappers`] value is dropped.

use crate::error::{Error, Result};
use crate::flags::{self, Flag};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The `cc`/`cxx` wrapper pair of one architecture
#[derive(Debug)]
pub struct CompilerWrappers {
    dir: TempDir,
    cc: PathBuf,
    cxx: PathBuf,
}

impl CompilerWrappers {
    /// Write both wrappers into a fresh directory under `tmp_root`
    pub fn write(
        tmp_root: &Path,
        label: &str,
        cc: &Path,
        cxx: &Path,
        baseline: &[Flag],
        ccache: Option<&Path>,
    ) -> Result<Self> {
        fs::create_dir_all(tmp_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("kiln-{}-", label))
            .tempdir_in(tmp_root)
            .map_err(|e| {
                Error::io(format!("Failed to create wrapper dir in {}", tmp_root.display()), e)
            })?;

        match ccache {
            Some(path) => info!("CC and CXX for {} will use ccache at {}", label, path.display()),
            None => info!("CC and CXX for {} will not use ccache", label),
        }

        let cc_path = dir.path().join("cc");
        let cxx_path = dir.path().join("cxx");
        write_script(&cc_path, &script(cc, baseline, ccache))?;
        write_script(&cxx_path, &script(cxx, baseline, ccache))?;
        debug!("wrote compiler wrappers to {}", dir.path().display());

        Ok(Self {
            dir,
            cc: cc_path,
            cxx: cxx_path,
        })
    }

    pub fn cc(&self) -> &Path {
        &self.cc
    }

    pub fn cxx(&self) -> &Path {
        &self.cxx
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Contents of a wrapper script
pub fn script(compiler: &Path, baseline: &[Flag], ccache: Option<&Path>) -> String {
    let mut line = String::new();
    if let Some(ccache) = ccache {
        line.push_str(&ccache.display().to_string());
        line.push(' ');
    }
    line.push_str(&compiler.display().to_string());
    if !baseline.is_empty() {
        line.push(' ');
        line.push_str(&flags::join(baseline));
    }
    format!("#!/bin/sh\n{} \"$@\"\n", line)
}

fn write_script(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}
