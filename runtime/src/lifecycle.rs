//! Lifecycle image reconciliation.
//!
//! The lifecycle image used by builds is configured through a config map:
//!
//! ```yaml
//! namespace: kpack
//! name: lifecycle-image
//! data:
//!   image: registry.io/buildpacksio/lifecycle@sha256:...
//! ```
//!
//! [`LifecycleReconciler`] compares the configured reference against the
//! image currently held by a [`LifecycleProvider`] and swaps it when the
//! identifier differs.

use std::collections::{BTreeMap, HashMap};

use cosigner_core::error::{Result, SignerError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::reference::ImageReference;

/// Config map holding the lifecycle image reference.
pub const LIFECYCLE_CONFIG_NAME: &str = "lifecycle-image";

/// Data key of the image reference.
pub const LIFECYCLE_CONFIG_KEY: &str = "image";

/// A namespaced string map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Read access to config maps.
pub trait ConfigMapLister: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;
}

/// Config maps held in memory, keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct InMemoryConfigMaps {
    maps: RwLock<HashMap<(String, String), ConfigMap>>,
}

impl InMemoryConfigMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config_map: ConfigMap) {
        let key = (config_map.namespace.clone(), config_map.name.clone());
        self.maps.write().insert(key, config_map);
    }
}

impl ConfigMapLister for InMemoryConfigMaps {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self
            .maps
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Holder of the current lifecycle image.
pub trait LifecycleProvider: Send + Sync {
    /// Identifier (digest or tag) of the image currently in use.
    fn digest(&self) -> Result<String>;

    /// Load the image named by `config_map`.
    fn update_image(&self, config_map: &ConfigMap) -> Result<()>;
}

/// Provider that keeps the configured reference itself; its digest is the
/// reference identifier.
#[derive(Debug)]
pub struct StaticLifecycleProvider {
    image: RwLock<ImageReference>,
}

impl StaticLifecycleProvider {
    pub fn new(image: ImageReference) -> Self {
        Self {
            image: RwLock::new(image),
        }
    }

    pub fn image(&self) -> ImageReference {
        self.image.read().clone()
    }
}

impl LifecycleProvider for StaticLifecycleProvider {
    fn digest(&self) -> Result<String> {
        Ok(self.image.read().identifier().to_string())
    }

    fn update_image(&self, config_map: &ConfigMap) -> Result<()> {
        let image = lifecycle_image(config_map)?;
        tracing::info!(image = %image, "Updated lifecycle image");
        *self.image.write() = image;
        Ok(())
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Configured identifier matches the provider's image.
    Unchanged,
    /// Provider was asked to load the configured image.
    Updated,
}

/// Keeps a [`LifecycleProvider`] in sync with the lifecycle config map.
pub struct LifecycleReconciler<L, P> {
    lister: L,
    provider: P,
}

impl<L: ConfigMapLister, P: LifecycleProvider> LifecycleReconciler<L, P> {
    pub fn new(lister: L, provider: P) -> Self {
        Self { lister, provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Reconcile the config map named by `key` (`namespace/name`).
    pub fn reconcile(&self, key: &str) -> Result<ReconcileOutcome> {
        let (namespace, name) = split_key(key)?;
        let config_map = self.lister.get(namespace, name)?.ok_or_else(|| {
            SignerError::Lifecycle(format!("configmap \"{}\" not found", key))
        })?;
        self.reconcile_config_map(&config_map)
    }

    /// Compare `config_map` with the provider's image and update on change.
    pub fn reconcile_config_map(&self, config_map: &ConfigMap) -> Result<ReconcileOutcome> {
        let digest = self.provider.digest()?;
        let image = lifecycle_image(config_map)?;

        if image.identifier() == digest {
            tracing::debug!(image = %image, "Lifecycle image unchanged");
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.provider.update_image(config_map)?;
        Ok(ReconcileOutcome::Updated)
    }
}

fn lifecycle_image(config_map: &ConfigMap) -> Result<ImageReference> {
    let image = config_map.data.get(LIFECYCLE_CONFIG_KEY).ok_or_else(|| {
        SignerError::Lifecycle(format!("{} config invalid", LIFECYCLE_CONFIG_NAME))
    })?;
    ImageReference::parse(image)
}

/// Split `namespace/name`. A bare name has an empty namespace.
fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok(("", *name)),
        [namespace, name] if !name.is_empty() => Ok((*namespace, *name)),
        _ => Err(SignerError::Lifecycle(format!(
            "failed splitting meta namespace key: unexpected key format: \"{}\"",
            key
        ))),
    }
}
