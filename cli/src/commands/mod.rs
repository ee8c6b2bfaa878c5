//! CLI command definitions and dispatch.

mod lifecycle;
mod secrets;
mod sign;
mod version;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cosigner_core::SignerConfig;

/// Cosigner: sign built images with every mounted cosign key.
#[derive(Parser)]
#[command(name = "cosigner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Sign the image from an export report with every mounted key
    Sign(sign::SignArgs),
    /// List the signing secrets that would be used
    Secrets(secrets::SecretsArgs),
    /// Reconcile a lifecycle image against its config map
    Lifecycle(lifecycle::LifecycleArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Load `--config` if given, then apply flag overrides.
pub(crate) fn load_config(
    path: Option<&PathBuf>,
    secret_root: Option<PathBuf>,
    cosign_binary: Option<PathBuf>,
) -> Result<SignerConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => SignerConfig::load(path)?,
        None => SignerConfig::default(),
    };
    if let Some(root) = secret_root {
        config.secret_root = root;
    }
    if let Some(binary) = cosign_binary {
        config.cosign_binary = binary;
    }
    Ok(config)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Sign(args) => sign::execute(args).await,
        Command::Secrets(args) => secrets::execute(args).await,
        Command::Lifecycle(args) => lifecycle::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
