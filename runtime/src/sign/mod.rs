//! Image signing.
//!
//! [`Signer`] walks the mounted signing secrets and hands one [`SignRequest`]
//! per secret to a [`SignCapability`], the component that actually creates
//! and uploads the signature. [`CosignCli`] is the capability backed by the
//! `cosign` executable.

mod cosign;
mod signer;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cosigner_core::error::Result;

pub use cosign::CosignCli;
pub use signer::Signer;

/// Key password resolver. The argument is cosign's "confirm" flag.
pub type PassFunc = Arc<dyn Fn(bool) -> Result<Vec<u8>> + Send + Sync>;

/// Signature annotations, passed through to every signing call untouched.
pub type Annotations = BTreeMap<String, serde_json::Value>;

/// Key material for one signing call.
#[derive(Clone)]
pub struct KeyOpts {
    /// Path or locator of the private key.
    pub key_ref: String,
    /// Invoked lazily by the capability when it needs the key password.
    pub pass_func: PassFunc,
}

impl std::fmt::Debug for KeyOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyOpts")
            .field("key_ref", &self.key_ref)
            .finish_non_exhaustive()
    }
}

/// One signing attempt.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub key_opts: KeyOpts,
    pub annotations: Option<Annotations>,
    pub image_ref: String,
    pub cert_path: Option<PathBuf>,
    pub upload: bool,
    pub payload_path: Option<PathBuf>,
    pub force: bool,
    pub recursive: bool,
}

/// Creates and attaches a signature for an image.
///
/// Registry and media-type settings are not part of the request; the
/// capability reads them from `COSIGN_REPOSITORY` and
/// `COSIGN_DOCKER_MEDIA_TYPES` at call time.
#[async_trait]
pub trait SignCapability: Send + Sync {
    async fn sign(&self, request: SignRequest) -> Result<()>;
}
