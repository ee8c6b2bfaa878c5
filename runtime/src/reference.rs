//! Image reference parsing.
//!
//! Splits references like `registry.io/team/lifecycle:0.17` or
//! `registry.io/team/lifecycle@sha256:...` into their components.

use cosigner_core::error::{Result, SignerError};

/// Registry assumed when the reference names none.
const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Tag assumed when the reference has neither tag nor digest.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, with port if any
    pub registry: String,
    /// Repository path (e.g., "library/nginx")
    pub repository: String,
    /// Tag, when the reference is by tag
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc..."), when the reference is by digest
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference string.
    ///
    /// - `nginx` → index.docker.io/library/nginx:latest
    /// - `registry.io/foo` → registry.io/foo:latest
    /// - `localhost:5000/foo:1` → localhost:5000/foo:1
    /// - `registry.io/foo@sha256:abc` → registry.io/foo@sha256:abc
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SignerError::Reference("empty image reference".to_string()));
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                let valid = digest
                    .split_once(':')
                    .map(|(alg, hex)| !alg.is_empty() && !hex.is_empty())
                    .unwrap_or(false);
                if !valid {
                    return Err(SignerError::Reference(format!(
                        "'{}': digest must be algorithm:hex",
                        reference
                    )));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag colon can only appear after the last path separator; earlier
        // colons belong to a registry port.
        let last_segment_start = name_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(i) => {
                let split = last_segment_start + i;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if tag.as_deref() == Some("") {
            return Err(SignerError::Reference(format!("'{}': empty tag", reference)));
        }

        let (registry, repository) = split_registry(name);
        if repository.is_empty() || repository.ends_with('/') {
            return Err(SignerError::Reference(format!(
                "'{}': empty repository",
                reference
            )));
        }

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The digest when present, otherwise the tag.
    pub fn identifier(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }
}

fn split_registry(name: &str) -> (String, String) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (first.to_string(), rest.to_string());
        }
        return (DEFAULT_REGISTRY.to_string(), name.to_string());
    }
    (DEFAULT_REGISTRY.to_string(), format!("library/{}", name))
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
