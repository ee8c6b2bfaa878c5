//! Signing secret discovery.
//!
//! Secrets are mounted one directory per secret under a common root:
//!
//! ```text
//! <secret-root>/
//!   <secret-name>/
//!     cosign.key         (required)
//!     cosign.password    (optional, raw bytes)
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cosigner_core::error::{Result, SignerError};

use crate::sign::PassFunc;

/// One discovered signing credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSecret {
    /// Directory name, unique within the root.
    pub name: String,
    /// The secret's directory.
    pub dir: PathBuf,
    /// Key file path, verified to exist at discovery time.
    pub key_path: PathBuf,
    /// Conventional password file path; may not exist.
    pub password_path: PathBuf,
}

impl SigningSecret {
    /// Password resolver for this secret.
    pub fn pass_func(&self) -> PassFunc {
        password_from_file(self.password_path.clone())
    }

    /// Whether a password file is currently present.
    pub fn has_password(&self) -> bool {
        self.password_path.is_file()
    }
}

/// Enumerate the secrets under `root`, sorted by name.
///
/// Fails as a whole if the root cannot be read or any secret directory is
/// missing its key file.
pub fn discover_secrets(root: &Path, key_file: &str, password_file: &str) -> Result<Vec<SigningSecret>> {
    let entries = std::fs::read_dir(root).map_err(|e| SignerError::Discovery {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SignerError::Discovery {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().into_string().map_err(|raw| SignerError::Discovery {
            path: root.to_path_buf(),
            message: format!("secret directory name is not valid UTF-8: {:?}", raw),
        })?;
        dirs.push((name, path));
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut secrets = Vec::with_capacity(dirs.len());
    for (name, dir) in dirs {
        let key_path = dir.join(key_file);
        if !key_path.is_file() {
            return Err(SignerError::MissingKey {
                secret: name,
                key_path,
            });
        }
        let password_path = dir.join(password_file);
        secrets.push(SigningSecret {
            name,
            dir,
            key_path,
            password_path,
        });
    }

    tracing::debug!(root = %root.display(), count = secrets.len(), "Discovered signing secrets");
    Ok(secrets)
}

/// Build a resolver returning the exact bytes of `path`, or an empty
/// password when the file does not exist. The file is read on every call.
pub fn password_from_file(path: PathBuf) -> PassFunc {
    Arc::new(move |_confirm: bool| match std::fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(SignerError::Password {
            path: path.clone(),
            message: e.to_string(),
        }),
    })
}
