// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use fomm::Config;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { package } => commands::cmd_info(&config, &package),
        Commands::Activate { package } => commands::cmd_activate(&config, &package),
        Commands::Deactivate { package } => commands::cmd_deactivate(&config, &package),
        Commands::Build {
            out,
            name,
            author,
            pkg_version,
            sources,
        } => commands::cmd_build(
            &out,
            name.as_deref(),
            author.as_deref(),
            pkg_version.as_deref(),
            &sources,
        ),
        Commands::List => commands::cmd_list(&config),
        Commands::Ledger => commands::cmd_ledger(&config),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "fomm", &mut std::io::stdout());
            Ok(())
        }
    }
}
