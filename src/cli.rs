// src/cli.rs
//! CLI definitions for fomm
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fomm")]
#[command(author = "FOMM Contributors")]
#[command(version)]
#[command(about = "Mod package manager with a precise install ledger", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults apply without one)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a package's metadata and state
    Info {
        /// Package container, or its file name inside the packages directory
        package: PathBuf,
    },

    /// Activate a package
    Activate {
        /// Package container, or its file name inside the packages directory
        package: PathBuf,
    },

    /// Deactivate a package
    Deactivate {
        /// Package container, or its file name inside the packages directory
        package: PathBuf,
    },

    /// Build a package from files, directories and archive entries
    Build {
        /// Output package path
        #[arg(short, long)]
        out: PathBuf,

        /// Package name (defaults to the output file name)
        #[arg(long)]
        name: Option<String>,

        /// Package author
        #[arg(long)]
        author: Option<String>,

        /// Display version
        #[arg(long)]
        pkg_version: Option<String>,

        /// Files, directories or archive:// entries added at the top level
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// List the packages in the packages directory
    List,

    /// Load the install ledger (migrating it if needed) and list its mods
    Ledger,

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}
