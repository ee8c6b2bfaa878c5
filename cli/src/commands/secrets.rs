//! `cosigner secrets` command.

use std::path::PathBuf;

use clap::Args;
use cosigner_runtime::discover_secrets;

use crate::output;

#[derive(Args)]
pub struct SecretsArgs {
    /// Signer configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory containing one subdirectory per signing secret
    #[arg(long)]
    pub secret_root: Option<PathBuf>,

    /// Only show secret names (one per line)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: SecretsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(args.config.as_ref(), args.secret_root, None)?;
    let secrets = discover_secrets(&config.secret_root, &config.key_file, &config.password_file)?;

    if args.quiet {
        for secret in &secrets {
            println!("{}", secret.name);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "KEY", "PASSWORD"]);
    for secret in &secrets {
        table.add_row(vec![
            secret.name.clone(),
            secret.key_path.display().to_string(),
            output::yes_no(secret.has_password()).to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}
