//! Cosigner Runtime - multi-key image signing.
//!
//! Discovers mounted signing secrets, scopes the per-key cosign environment
//! overrides, and signs a built image once per key.

pub mod env;
pub mod lifecycle;
pub mod reference;
pub mod report;
pub mod secrets;
pub mod sign;

// Re-export common types
pub use env::{EnvOverride, SigningEnv};
pub use lifecycle::{
    ConfigMap, ConfigMapLister, InMemoryConfigMaps, LifecycleProvider, LifecycleReconciler,
    ReconcileOutcome, StaticLifecycleProvider,
};
pub use reference::ImageReference;
pub use report::{ExportReport, ImageReport};
pub use secrets::{discover_secrets, password_from_file, SigningSecret};
pub use sign::{Annotations, CosignCli, KeyOpts, PassFunc, SignCapability, SignRequest, Signer};

/// Cosigner Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
