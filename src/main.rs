// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, HostArgs};
use tracing::info;
use upgrade_store::{PackageRecord, PackageStore, StoreConfig};

/// Build the host configuration from a file and command-line overrides
fn load_config(host: &HostArgs) -> Result<StoreConfig> {
    let mut config = match &host.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => StoreConfig::default(),
    };

    if let Some(version) = &host.current_version {
        config.current_version = version.clone();
    }
    if let Some(platform) = &host.platform {
        config.current_platform = platform.clone();
    }
    if let Some(arch) = &host.arch {
        config.current_arch = arch.clone();
    }

    Ok(config)
}

fn print_records(records: &[PackageRecord]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `cat` output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.host)?;
    let store = PackageStore::open(&cli.root, config)
        .await
        .with_context(|| format!("Failed to open upgrade store at {}", cli.root))?;

    match cli.command {
        Commands::List { compatible } => {
            let records = if compatible {
                store.compatible_upgrades().await?
            } else {
                store.list_available_upgrades().await?
            };
            print_records(&records)
        }
        Commands::Import { path, version } => {
            info!("Importing {} as version {}", path, version);
            let record = store
                .import_existing(&path, &version)
                .await
                .with_context(|| format!("Failed to import {}", path))?;
            print_records(&[record])
        }
        Commands::Write {
            name,
            version,
            hash,
        } => {
            let session = store.begin_write(&name, &version, &hash).await?;
            let mut stdin = tokio::io::stdin();
            let record = session
                .copy_from(&mut stdin)
                .await
                .with_context(|| format!("Failed to store {}", name))?;
            print_records(&[record])
        }
        Commands::Cat { hash } => {
            let mut reader = store.read_by_hash(&hash).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout)
                .await
                .with_context(|| format!("Failed to read package {}", hash))?;
            tokio::io::AsyncWriteExt::flush(&mut stdout).await?;
            Ok(())
        }
        Commands::Remove { hash } => {
            let record = store.remove_by_hash(&hash).await?;
            println!("Removed {} ({})", record.filename, record.hash);
            Ok(())
        }
        Commands::Clear => {
            let report = store.clear_obsolete().await?;
            println!(
                "Removed {} obsolete package(s), kept {}",
                report.removed.len(),
                report.kept.len()
            );
            Ok(())
        }
    }
}
