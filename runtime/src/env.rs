//! Scoped process environment overrides.
//!
//! cosign reads its registry and media-type settings from the process
//! environment. [`EnvOverride`] writes a variable for the lifetime of the
//! guard and removes it on drop, so each override is confined to a single
//! signing call on every exit path.

use cosigner_core::config::{COSIGN_DOCKER_MEDIA_TYPES_ENV, COSIGN_REPOSITORY_ENV};

/// Guard over one environment variable. The variable is unset on drop.
#[derive(Debug)]
pub struct EnvOverride {
    name: &'static str,
}

impl EnvOverride {
    /// Set `name` to `value`, or make sure it is unset when `value` is `None`.
    pub fn apply(name: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        std::env::remove_var(self.name);
    }
}

/// Per-secret cosign environment: repository and docker media types.
#[derive(Debug)]
pub struct SigningEnv {
    _repository: EnvOverride,
    _docker_media_types: EnvOverride,
}

impl SigningEnv {
    pub fn apply(repository: Option<&str>, docker_media_types: Option<&str>) -> Self {
        if let Some(repository) = repository {
            tracing::debug!(repository, "Applying COSIGN_REPOSITORY override");
        }
        if let Some(docker_media_types) = docker_media_types {
            tracing::debug!(docker_media_types, "Applying COSIGN_DOCKER_MEDIA_TYPES override");
        }
        Self {
            _repository: EnvOverride::apply(COSIGN_REPOSITORY_ENV, repository),
            _docker_media_types: EnvOverride::apply(COSIGN_DOCKER_MEDIA_TYPES_ENV, docker_media_types),
        }
    }
}
