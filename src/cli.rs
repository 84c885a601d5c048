// src/cli.rs
//! CLI definitions for the upgrade store
//!
//! This module contains the command-line interface definitions using clap.
//! Command implementations live in `main.rs`.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "upgrade-store")]
#[command(version)]
#[command(about = "Inspect and maintain a local store of upgrade packages", long_about = None)]
pub struct Cli {
    /// Store root directory
    #[arg(short, long, global = true, default_value = "./upgrades")]
    pub root: String,

    #[command(flatten)]
    pub host: HostArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Description of the installed build
#[derive(Args)]
pub struct HostArgs {
    /// TOML file describing the installed build
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Installed version (overrides the config file)
    #[arg(long, global = true)]
    pub current_version: Option<String>,

    /// Installed platform (overrides the config file)
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Installed architecture (overrides the config file)
    #[arg(long, global = true)]
    pub arch: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every package in the store as JSON
    List {
        /// Only show packages installable over the current build
        #[arg(long)]
        compatible: bool,
    },

    /// Import an existing package file
    Import {
        /// Path to the package file
        path: String,

        /// Version of the package
        version: String,
    },

    /// Write a package from standard input
    Write {
        /// Destination file name inside the store
        name: String,

        /// Version of the package
        version: String,

        /// Expected SHA-256 of the content
        #[arg(long)]
        hash: String,
    },

    /// Write a stored package to standard output
    Cat {
        /// Content hash of the package
        hash: String,
    },

    /// Remove a stored package
    Remove {
        /// Content hash of the package
        hash: String,
    },

    /// Remove packages that are not newer than the installed build
    Clear,
}
