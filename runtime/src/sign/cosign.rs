//! Sign capability backed by the `cosign` executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use cosigner_core::config::{COSIGN_PASSWORD_ENV, DEFAULT_COSIGN_BINARY};
use cosigner_core::error::{Result, SignerError};
use tokio::process::Command;

use super::{SignCapability, SignRequest};

/// Runs `cosign sign` as a child process.
///
/// The child inherits the current environment, including any scoped
/// `COSIGN_REPOSITORY` / `COSIGN_DOCKER_MEDIA_TYPES` override.
#[derive(Debug, Clone)]
pub struct CosignCli {
    binary: PathBuf,
}

impl CosignCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line arguments for a request, excluding the binary itself.
    pub fn build_args(request: &SignRequest) -> Vec<String> {
        let mut args = vec![
            "sign".to_string(),
            "--key".to_string(),
            request.key_opts.key_ref.clone(),
        ];

        if let Some(annotations) = &request.annotations {
            for (key, value) in annotations {
                args.push("-a".to_string());
                args.push(format!("{}={}", key, annotation_value(value)));
            }
        }

        args.push(format!("--upload={}", request.upload));

        if let Some(cert) = &request.cert_path {
            args.push("--cert".to_string());
            args.push(cert.to_string_lossy().to_string());
        }
        if let Some(payload) = &request.payload_path {
            args.push("--payload".to_string());
            args.push(payload.to_string_lossy().to_string());
        }
        if request.force {
            args.push("--force".to_string());
        }
        if request.recursive {
            args.push("--recursive".to_string());
        }

        args.push(request.image_ref.clone());
        args
    }
}

impl Default for CosignCli {
    fn default() -> Self {
        Self::new(DEFAULT_COSIGN_BINARY)
    }
}

#[async_trait]
impl SignCapability for CosignCli {
    async fn sign(&self, request: SignRequest) -> Result<()> {
        let password = password_env_value((request.key_opts.pass_func)(false)?)?;

        let args = Self::build_args(&request);
        tracing::debug!(binary = %self.binary.display(), image = %request.image_ref, "Running cosign sign");

        let output = Command::new(&self.binary)
            .args(&args)
            .env(COSIGN_PASSWORD_ENV, password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SignerError::Capability(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignerError::Capability(format!(
                "cosign exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// The password bytes as handed to the child, unchanged.
#[cfg(unix)]
fn password_env_value(password: Vec<u8>) -> Result<OsString> {
    use std::os::unix::ffi::OsStringExt;

    Ok(OsString::from_vec(password))
}

#[cfg(not(unix))]
fn password_env_value(password: Vec<u8>) -> Result<OsString> {
    String::from_utf8(password)
        .map(OsString::from)
        .map_err(|_| SignerError::Capability("key password is not valid UTF-8".to_string()))
}

/// Strings are passed verbatim; other JSON values in their JSON form.
fn annotation_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
