//! `cosigner lifecycle` command.
//!
//! Runs one reconcile pass of a lifecycle provider seeded with `--image`
//! against a config map document read from disk.

use std::path::PathBuf;

use clap::Args;
use cosigner_runtime::{
    ConfigMap, ImageReference, InMemoryConfigMaps, LifecycleReconciler, ReconcileOutcome,
    StaticLifecycleProvider,
};

#[derive(Args)]
pub struct LifecycleArgs {
    /// Lifecycle image currently in use
    #[arg(long)]
    pub image: String,

    /// Config map document (YAML with namespace, name and data)
    #[arg(long)]
    pub config_map: PathBuf,
}

pub async fn execute(args: LifecycleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let current = ImageReference::parse(&args.image)?;
    let data = std::fs::read_to_string(&args.config_map)
        .map_err(|e| format!("Failed to read {}: {}", args.config_map.display(), e))?;
    let config_map: ConfigMap = serde_yaml::from_str(&data)?;
    let key = format!("{}/{}", config_map.namespace, config_map.name);

    let lister = InMemoryConfigMaps::new();
    lister.insert(config_map);
    let reconciler = LifecycleReconciler::new(lister, StaticLifecycleProvider::new(current));

    match reconciler.reconcile(&key)? {
        ReconcileOutcome::Unchanged => println!("Lifecycle image unchanged"),
        ReconcileOutcome::Updated => {
            println!("Lifecycle image updated to {}", reconciler.provider().image())
        }
    }
    Ok(())
}
