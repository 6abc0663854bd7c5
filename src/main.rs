// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.global.log_level())),
        )
        .with_target(false)
        .init();

    let options = cli.global.context_options();

    match cli.command {
        Commands::Recipes { compact } => commands::cmd_recipes(options, compact),
        Commands::Deps { target } => commands::cmd_deps(options, &target),
        Commands::Info => commands::cmd_info(options),
        Commands::BuildInfo { sdk, arch } => commands::cmd_build_info(options, &sdk, &arch),
        Commands::Status => commands::cmd_status(options),
        Commands::Build {
            sdk,
            archs,
            recipes,
            force,
        } => commands::cmd_build(options, &sdk, &archs, &recipes, force),
        Commands::Clean { recipe, all } => commands::cmd_clean(options, &recipe, all),
    }
}
