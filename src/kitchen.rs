// src/kitchen.rs

//! Kitchen: where recipes are cooked for each architecture
//!
//! Cooking a set of targets:
//!
//! 1. every requested architecture is validated against the supported table
//! 2. each target is expanded through the dependency walker; missing and
//!    circular dependencies fail before any work starts
//! 3. the expanded edges are sorted into a strict build order
//! 4. host prerequisites are checked once
//! 5. one environment per architecture is derived and reused for every recipe
//! 6. each recipe is fetched, unpacked and built per architecture, and the
//!    build state is updated as each step completes
//!
//! A recipe is skipped unless forced when it is recorded as built for every
//! requested architecture.

use crate::context::BuildContext;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::recipe::graph::{BuildGraph, DependencyWalker};
use crate::recipe::{Recipe, RecipeRegistry};
use crate::sdk::{Prerequisites, ToolLocator};
use crate::shell::{RunFlags, Shell};
use crate::state::{self, StateStore};
use crate::template::{self, TemplateMap};
use crate::toolchain::{Environment, ToolchainBuilder};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the reproduction script written into each build directory
pub const RUN_SCRIPT: &str = "run-me.sh";

/// Options for a cooking session
#[derive(Debug, Clone, Default)]
pub struct CookOptions {
    /// Rebuild recipes even when the state says they are built
    pub force: bool,
}

impl CookOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// What a cooking session did
#[derive(Debug, Default)]
pub struct CookReport {
    /// Build order of everything requested
    pub order: Vec<String>,
    pub built: Vec<String>,
    pub skipped: Vec<String>,
}

/// The Kitchen: where recipes are cooked
pub struct Kitchen<'a> {
    ctx: &'a BuildContext,
    registry: RecipeRegistry,
    walker: DependencyWalker,
    toolchain: ToolchainBuilder<'a>,
    state: StateStore,
    shell: Shell,
    downloader: Option<Downloader>,
}

impl<'a> Kitchen<'a> {
    pub fn new(ctx: &'a BuildContext, locator: &'a dyn ToolLocator, shell: Shell) -> Self {
        Self {
            ctx,
            registry: RecipeRegistry::from_context(ctx),
            walker: DependencyWalker::new(ctx.implicit_dependencies.iter().cloned()),
            toolchain: ToolchainBuilder::new(ctx, locator, shell.clone()),
            state: StateStore::new(ctx.state_path()),
            shell,
            downloader: None,
        }
    }

    /// Build order for `targets`, dependencies first
    pub fn plan(&mut self, targets: &[String]) -> Result<Vec<String>> {
        let mut nodes = Vec::new();
        for target in targets {
            nodes.extend(self.walker.expand(target, &mut self.registry)?);
        }
        BuildGraph::from_nodes(&nodes).topological_sort()
    }

    /// Cook `targets` and their dependencies for each of `cpus` on `sdk`
    pub fn cook(
        &mut self,
        targets: &[String],
        sdk: &str,
        cpus: &[String],
        options: &CookOptions,
    ) -> Result<CookReport> {
        let mut arch_names = Vec::with_capacity(cpus.len());
        for cpu in cpus {
            arch_names.push(self.toolchain.architecture(sdk, cpu)?.name());
        }

        let order = self.plan(targets)?;
        info!("Build order: {}", order.join(", "));

        let mut report = CookReport {
            order: order.clone(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for name in order {
            if !options.force && self.is_cooked(&name, &arch_names) {
                info!("{} is already built, skipping", name);
                report.skipped.push(name);
            } else {
                pending.push(name);
            }
        }

        if pending.is_empty() {
            return Ok(report);
        }

        Prerequisites::check(&self.shell).ensure()?;

        let mut envs = Vec::with_capacity(cpus.len());
        for cpu in cpus {
            envs.push(self.toolchain.environment(sdk, cpu)?);
        }

        for name in pending {
            let recipe = self.registry.get(&name).ok_or_else(|| {
                Error::NotFound(format!("recipe '{}'", name))
            })?;
            self.cook_recipe(&recipe, &envs, options)?;
            report.built.push(name);
        }

        Ok(report)
    }

    /// Whether `name` is recorded as built for every one of `arch_names`
    ///
    /// Recipes that build once for all architectures only need the
    /// completion record.
    fn is_cooked(&mut self, name: &str, arch_names: &[String]) -> bool {
        let per_arch = self.registry.get(name).is_none_or(|r| r.build.per_arch);
        if !per_arch {
            return self.state.is_built(name);
        }
        arch_names
            .iter()
            .all(|arch| self.state.contains(&state::key(name, &format!("build_{}", arch))))
    }

    fn cook_recipe(
        &mut self,
        recipe: &Recipe,
        envs: &[Arc<Environment>],
        options: &CookOptions,
    ) -> Result<()> {
        info!(
            "Cooking {} {}",
            recipe.name(),
            recipe.version().unwrap_or("(unversioned)")
        );

        let archive = self.fetch_source(recipe)?;

        let targets: Vec<&Arc<Environment>> = if recipe.build.per_arch {
            envs.iter().collect()
        } else {
            envs.iter().take(1).collect()
        };

        for env in targets {
            let arch_key = state::key(recipe.name(), &format!("build_{}", env.arch.name()));
            if self.state.contains(&arch_key) && !options.force {
                info!("{} already built for {}", recipe.name(), env.arch);
                continue;
            }

            let build_dir = if recipe.build.per_arch {
                recipe.arch_build_dir(&env.arch.name())
            } else {
                recipe.build_dir.join("all")
            };
            self.build_for(recipe, env, &build_dir, archive.as_deref())
                .map_err(|e| Error::BuildFailed {
                    recipe: recipe.name().to_string(),
                    arch: env.arch.name(),
                    reason: e.to_string(),
                })?;

            self.state.set(&arch_key, Utc::now().to_rfc3339())?;
        }

        self.state.mark_built(recipe.name())?;
        info!("{} built", recipe.name());
        Ok(())
    }

    fn fetch_source(&mut self, recipe: &Recipe) -> Result<Option<PathBuf>> {
        let Some(url) = recipe.source_url()? else {
            return Ok(None);
        };

        if self.downloader.is_none() {
            self.downloader = Some(Downloader::new()?);
        }
        let downloader = self
            .downloader
            .as_ref()
            .ok_or_else(|| Error::DownloadError("downloader unavailable".to_string()))?;

        let dest = self.ctx.downloads_dir();
        fs::create_dir_all(&dest)?;
        downloader.fetch(&url, &dest, false).map(Some)
    }

    fn build_for(
        &self,
        recipe: &Recipe,
        env: &Environment,
        build_dir: &Path,
        archive: Option<&Path>,
    ) -> Result<()> {
        fs::create_dir_all(build_dir)?;

        let src_dir = match archive {
            Some(archive) => {
                let src = build_dir.join(recipe.source_subdir()?);
                if !src.exists() {
                    unpack(&self.shell, archive, build_dir)?;
                }
                src
            }
            None => build_dir.to_path_buf(),
        };
        fs::create_dir_all(&src_dir)?;

        let values = self.template_values(recipe, env, &src_dir);
        let mut vars = env.vars().clone();
        for (key, value) in &recipe.build.environment {
            vars.insert(key.clone(), template::render(value, &values)?);
        }

        let steps = [
            ("configure", &recipe.build.configure),
            ("make", &recipe.build.make),
            ("install", &recipe.build.install),
        ];
        let mut commands = Vec::new();
        for (phase, step) in steps {
            if let Some(step) = step {
                commands.push((phase, template::render(step, &values)?));
            }
        }

        write_run_script(build_dir, &src_dir, &vars, &commands)?;

        for (phase, command) in &commands {
            info!("{} [{}]: {}", recipe.name(), env.arch, phase);
            self.shell.run_in(
                "sh",
                &["-c", command.as_str()],
                &src_dir,
                &vars,
                RunFlags::ABORT | RunFlags::MIRROR,
            )?;
        }

        for library in &recipe.build.libraries {
            let path = src_dir.join(template::render(library, &values)?);
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "library {} was not produced",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    fn template_values(&self, recipe: &Recipe, env: &Environment, src_dir: &Path) -> TemplateMap {
        let mut values = self.ctx.template_values();
        values.extend(env.template_values());
        values.extend(recipe.template_values());
        values.insert("srcdir".into(), json!(src_dir.display().to_string()));
        values
    }
}

/// Unpack `archive` into `dest` with the host's tar
fn unpack(shell: &Shell, archive: &Path, dest: &Path) -> Result<()> {
    debug!("unpacking {} into {}", archive.display(), dest.display());
    let archive = archive.display().to_string();
    let dest = dest.display().to_string();
    shell.run("tar", &["-xf", archive.as_str(), "-C", dest.as_str()], RunFlags::DEFAULT)?;
    Ok(())
}

/// Write a standalone script reproducing the build steps
fn write_run_script(
    build_dir: &Path,
    src_dir: &Path,
    vars: &BTreeMap<String, String>,
    commands: &[(&str, String)],
) -> Result<PathBuf> {
    let mut script = String::from("#!/bin/sh\nset -e\n");
    for (key, value) in vars {
        script.push_str(&format!("export {}='{}'\n", key, value.replace('\'', r"'\''")));
    }
    script.push_str(&format!("cd '{}'\n", src_dir.display()));
    for (phase, command) in commands {
        script.push_str(&format!("# {}\n{}\n", phase, command));
    }

    let path = build_dir.join(RUN_SCRIPT);
    fs::write(&path, script)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_script_quotes_values() {
        let dir = tempdir().unwrap();
        let vars = BTreeMap::from([("CFLAGS".to_string(), "-DNAME='x'".to_string())]);
        let commands = vec![("make", "make -j4".to_string())];

        let path = write_run_script(dir.path(), Path::new("/src"), &vars, &commands).unwrap();
        let script = fs::read_to_string(path).unwrap();

        assert!(script.starts_with("#!/bin/sh\nset -e\n"));
        assert!(script.contains(r"export CFLAGS='-DNAME='\''x'\'''"));
        assert!(script.contains("cd '/src'\n# make\nmake -j4\n"));
    }
}
