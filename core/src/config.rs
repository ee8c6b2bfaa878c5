use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SignerError};

/// Default mount point of the signing secrets.
pub const DEFAULT_SECRET_ROOT: &str = "/var/build-secrets/cosign";

/// Key file expected inside each secret directory.
pub const DEFAULT_KEY_FILE: &str = "cosign.key";

/// Optional password file inside each secret directory.
pub const DEFAULT_PASSWORD_FILE: &str = "cosign.password";

/// Default cosign executable, resolved through `PATH`.
pub const DEFAULT_COSIGN_BINARY: &str = "cosign";

/// Registry override read by cosign.
pub const COSIGN_REPOSITORY_ENV: &str = "COSIGN_REPOSITORY";

/// Docker media types toggle read by cosign.
pub const COSIGN_DOCKER_MEDIA_TYPES_ENV: &str = "COSIGN_DOCKER_MEDIA_TYPES";

/// Key password handed to the cosign child process.
pub const COSIGN_PASSWORD_ENV: &str = "COSIGN_PASSWORD";

/// Signer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Directory holding one subdirectory per signing secret
    pub secret_root: PathBuf,

    /// Key file name inside a secret directory
    pub key_file: String,

    /// Password file name inside a secret directory
    pub password_file: String,

    /// Path or name of the cosign executable
    pub cosign_binary: PathBuf,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            secret_root: PathBuf::from(DEFAULT_SECRET_ROOT),
            key_file: DEFAULT_KEY_FILE.to_string(),
            password_file: DEFAULT_PASSWORD_FILE.to_string(),
            cosign_binary: PathBuf::from(DEFAULT_COSIGN_BINARY),
        }
    }
}

impl SignerConfig {
    /// Load configuration from a file. `.json` files are parsed as JSON,
    /// anything else as YAML. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SignerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&data)?,
            _ => serde_yaml::from_str(&data)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot address a file inside a secret directory.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("key_file", &self.key_file), ("password_file", &self.password_file)] {
            if value.is_empty() || value.contains('/') {
                return Err(SignerError::Config(format!(
                    "{} must be a plain file name, got '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }
}
