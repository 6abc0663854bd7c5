// src/toolchain/mod.rs

//! Per-architecture build environments
//!
//! [`ToolchainBuilder::environment`] turns an `(sdk, cpu)` pair into an
//! [`Environment`]:
//!
//! 1. the pair is checked against the supported table before anything else
//! 2. compilers, archiver, linker and sysroot are located through the SDK
//! 3. ccache is picked up from the host when enabled
//! 4. global and architecture flags are merged, global first
//! 5. compiler wrappers are written and the variable map is composed
//!
//! Environments are cached per architecture for the lifetime of the builder.

pub mod arch;
pub mod env;
pub mod wrapper;

pub use arch::Architecture;
pub use wrapper::CompilerWrappers;

use crate::context::BuildContext;
use crate::error::Result;
use crate::flags::GnuFlags;
use crate::sdk::ToolLocator;
use crate::shell::Shell;
use crate::template::TemplateMap;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Fully resolved toolchain for one architecture
#[derive(Debug)]
pub struct Environment {
    pub arch: Architecture,
    /// Real compilers as reported by the SDK
    pub real_cc: PathBuf,
    pub real_cxx: PathBuf,
    pub ar: PathBuf,
    pub ld: PathBuf,
    pub sysroot: PathBuf,
    pub ccache: Option<PathBuf>,
    /// Global flags followed by architecture flags
    pub flags: GnuFlags,
    vars: BTreeMap<String, String>,
    wrappers: CompilerWrappers,
}

impl Environment {
    /// Wrapper standing in for the C compiler
    pub fn cc(&self) -> &Path {
        self.wrappers.cc()
    }

    /// Wrapper standing in for the C++ compiler
    pub fn cxx(&self) -> &Path {
        self.wrappers.cxx()
    }

    /// Variables passed to build steps, nothing else is inherited
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Values exposed to recipe command templates
    pub fn template_values(&self) -> TemplateMap {
        let mut map = TemplateMap::new();
        map.insert("arch".into(), json!(self.arch.cpu));
        map.insert("sdk".into(), json!(self.arch.sdk));
        map.insert("host".into(), json!(self.arch.triple));
        map.insert("sysroot".into(), json!(self.sysroot.display().to_string()));
        map.insert("cc".into(), json!(self.cc().display().to_string()));
        map.insert("cxx".into(), json!(self.cxx().display().to_string()));
        map.insert("ar".into(), json!(self.ar.display().to_string()));
        map.insert("ld".into(), json!(self.ld.display().to_string()));
        map
    }
}

/// Derives and caches [`Environment`]s
pub struct ToolchainBuilder<'a> {
    ctx: &'a BuildContext,
    locator: &'a dyn ToolLocator,
    shell: Shell,
    cache: HashMap<Architecture, Arc<Environment>>,
}

impl<'a> ToolchainBuilder<'a> {
    pub fn new(ctx: &'a BuildContext, locator: &'a dyn ToolLocator, shell: Shell) -> Self {
        Self {
            ctx,
            locator,
            shell,
            cache: HashMap::new(),
        }
    }

    /// Validate an `(sdk, cpu)` pair against the supported table
    pub fn architecture(&self, sdk: &str, cpu: &str) -> Result<Architecture> {
        Architecture::lookup(sdk, cpu, &self.ctx.min_os_version)
    }

    /// Environment for `(sdk, cpu)`, built on first request
    pub fn environment(&mut self, sdk: &str, cpu: &str) -> Result<Arc<Environment>> {
        let arch = self.architecture(sdk, cpu)?;
        if let Some(env) = self.cache.get(&arch) {
            return Ok(Arc::clone(env));
        }

        let env = Arc::new(self.build(arch.clone())?);
        self.cache.insert(arch, Arc::clone(&env));
        Ok(env)
    }

    fn build(&self, arch: Architecture) -> Result<Environment> {
        info!("Preparing toolchain for {}", arch);

        let real_cc = self.locator.find_tool(&arch.sdk, "clang")?;
        let real_cxx = self.locator.find_tool(&arch.sdk, "clang++")?;
        let ar = self.locator.find_tool(&arch.sdk, "ar")?;
        let ld = self.locator.find_tool(&arch.sdk, "ld")?;
        let sysroot = self.locator.sdk_path(&arch.sdk)?;
        debug!("{}: cc={} sysroot={}", arch, real_cc.display(), sysroot.display());

        let ccache = if self.ctx.use_ccache {
            self.shell.which("ccache")
        } else {
            None
        };

        let flags = self.ctx.gnuflags.merged(
            &arch.local_flags(&sysroot, &self.ctx.prefix),
            self.ctx.dedup_flags,
        );

        let wrappers = CompilerWrappers::write(
            &self.ctx.tmp_root,
            &arch.name(),
            &real_cc,
            &real_cxx,
            &arch.baseline_flags(&sysroot),
            ccache.as_deref(),
        )?;

        let vars = env::compose(&env::EnvInputs {
            host_env: &self.ctx.host_env,
            triple: &arch.triple,
            cc: wrappers.cc(),
            cxx: wrappers.cxx(),
            ar: &ar,
            ld: &ld,
            ccache: ccache.as_deref(),
            flags: &flags,
        });

        Ok(Environment {
            arch,
            real_cc,
            real_cxx,
            ar,
            ld,
            sysroot,
            ccache,
            flags,
            vars,
            wrappers,
        })
    }
}
