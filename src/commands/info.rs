// src/commands/info.rs
//! Context and toolchain inspection commands

use super::open_context;
use anyhow::{Context, Result};
use kiln::{Architecture, ContextOptions, Prerequisites, Shell, ToolLocator, ToolchainBuilder, Xcrun};
use tracing::warn;

/// Show the resolved context, installed SDKs and supported architectures
pub fn cmd_info(options: ContextOptions) -> Result<()> {
    let ctx = open_context(options)?;
    let shell = Shell::system();

    println!("Context");
    println!("{}", "=".repeat(40));
    if let Some(path) = &ctx.config_file {
        println!("Config file:  {}", path.display());
    }
    println!("Workdir:      {}", ctx.workdir.display());
    println!("Build dir:    {}", ctx.builddir.display());
    println!("Cache dir:    {}", ctx.cachedir.display());
    println!("Prefix:       {}", ctx.prefix.display());
    println!("Recipes:      {}", ctx.recipes_dir.display());
    for path in &ctx.custom_recipes {
        println!("              {}", path.display());
    }
    println!("Jobs:         {}", ctx.jobs);
    println!("ccache:       {}", if ctx.use_ccache { "enabled" } else { "disabled" });
    println!("Min OS:       {}", ctx.min_os_version);

    println!();
    println!("SDKs");
    println!("{}", "=".repeat(40));
    match Xcrun::new(shell.clone()).list_sdks() {
        Ok(sdks) if !sdks.is_empty() => {
            for sdk in sdks {
                println!("{:<24} {:<10} {}", sdk.canonical_name, sdk.sdk_version, sdk.display_name);
            }
        }
        Ok(_) => println!("(none)"),
        Err(e) => {
            warn!("Cannot list SDKs: {}", e);
            println!("(unavailable)");
        }
    }

    println!();
    println!("Architectures");
    println!("{}", "=".repeat(40));
    for arch in Architecture::supported(&ctx.min_os_version) {
        println!("{:<24} {:<24} {}", arch.name(), arch.triple, arch.min_os_flag);
    }

    println!();
    println!("Host tools");
    println!("{}", "=".repeat(40));
    for (tool, path) in Prerequisites::check(&shell).report() {
        match path {
            Some(path) => println!("{:<12} {}", tool, path.display()),
            None => println!("{:<12} (not found)", tool),
        }
    }

    Ok(())
}

/// Print the environment recipes are built with for `(sdk, arch)`
pub fn cmd_build_info(options: ContextOptions, sdk: &str, arch: &str) -> Result<()> {
    let ctx = open_context(options)?;
    let shell = Shell::system();
    let xcrun = Xcrun::new(shell.clone());
    let mut toolchain = ToolchainBuilder::new(&ctx, &xcrun, shell);

    let env = toolchain
        .environment(sdk, arch)
        .with_context(|| format!("Failed to prepare toolchain for {}-{}", sdk, arch))?;

    println!("# {} ({})", env.arch, env.arch.triple);
    println!("# cc:      {}", env.real_cc.display());
    println!("# sysroot: {}", env.sysroot.display());
    for (key, value) in env.vars() {
        println!("{}=\"{}\"", key, value);
    }

    Ok(())
}
