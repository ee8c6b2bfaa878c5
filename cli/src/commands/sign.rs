//! `cosigner sign` command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use cosigner_runtime::{Annotations, CosignCli, ExportReport, Signer};

use crate::output::parse_key_value;

#[derive(Args)]
pub struct SignArgs {
    /// Export report written by the image build (report.toml)
    #[arg(long)]
    pub report: PathBuf,

    /// Signer configuration file (YAML, or JSON with a .json extension)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory containing one subdirectory per signing secret
    #[arg(long)]
    pub secret_root: Option<PathBuf>,

    /// Path to the cosign executable
    #[arg(long)]
    pub cosign_binary: Option<PathBuf>,

    /// Signature annotation (KEY=VALUE), repeatable
    #[arg(short, long = "annotation", value_parser = parse_key_value)]
    pub annotations: Vec<(String, String)>,

    /// Per-secret COSIGN_REPOSITORY override (SECRET=REPOSITORY), repeatable
    #[arg(long = "repository", value_parser = parse_key_value)]
    pub repositories: Vec<(String, String)>,

    /// Per-secret COSIGN_DOCKER_MEDIA_TYPES override (SECRET=VALUE), repeatable
    #[arg(long = "docker-media-types", value_parser = parse_key_value)]
    pub docker_media_types: Vec<(String, String)>,
}

pub async fn execute(args: SignArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(args.config.as_ref(), args.secret_root, args.cosign_binary)?;
    let report = ExportReport::load(&args.report)?;
    tracing::debug!(report = %args.report.display(), tags = report.tags().len(), "Loaded export report");

    let annotations = to_annotations(args.annotations);
    let repositories = to_overrides(args.repositories);
    let media_types = to_overrides(args.docker_media_types);

    let capability = Arc::new(CosignCli::new(config.cosign_binary.clone()));
    let signer = Signer::new(&config, capability);
    signer
        .sign(
            &report,
            annotations.as_ref(),
            repositories.as_ref(),
            media_types.as_ref(),
        )
        .await?;

    if let Some(image) = report.primary_tag() {
        println!("Signed {}", image);
    }
    Ok(())
}

/// No flags means no annotation set at all, not an empty one.
fn to_annotations(pairs: Vec<(String, String)>) -> Option<Annotations> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    )
}

fn to_overrides(pairs: Vec<(String, String)>) -> Option<HashMap<String, String>> {
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.into_iter().collect())
    }
}
