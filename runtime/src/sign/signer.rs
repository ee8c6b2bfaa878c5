//! Multi-key signer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cosigner_core::config::SignerConfig;
use cosigner_core::error::{Result, SignerError};
use tokio::sync::Mutex;

use super::{Annotations, KeyOpts, SignCapability, SignRequest};
use crate::env::SigningEnv;
use crate::report::ExportReport;
use crate::secrets::{discover_secrets, SigningSecret};

/// Serializes the environment window of concurrent `sign` calls in this
/// process. The cosign override variables are process-global.
static SIGNING_ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Signs a built image once per mounted signing secret.
pub struct Signer {
    secret_root: PathBuf,
    key_file: String,
    password_file: String,
    capability: Arc<dyn SignCapability>,
}

impl Signer {
    pub fn new(config: &SignerConfig, capability: Arc<dyn SignCapability>) -> Self {
        Self {
            secret_root: config.secret_root.clone(),
            key_file: config.key_file.clone(),
            password_file: config.password_file.clone(),
            capability,
        }
    }

    pub fn secret_root(&self) -> &Path {
        &self.secret_root
    }

    /// Secrets that a `sign` call would use, in signing order.
    pub fn discover(&self) -> Result<Vec<SigningSecret>> {
        discover_secrets(&self.secret_root, &self.key_file, &self.password_file)
    }

    /// Sign the report's first tag with every discovered secret.
    ///
    /// Secrets are processed one at a time in name order. For each one the
    /// `COSIGN_REPOSITORY` and `COSIGN_DOCKER_MEDIA_TYPES` variables are set
    /// from the matching override entry, or unset when there is none, and are
    /// unset again as soon as the call returns. The first failure aborts the
    /// remaining secrets.
    pub async fn sign(
        &self,
        report: &ExportReport,
        annotations: Option<&Annotations>,
        repository_overrides: Option<&HashMap<String, String>>,
        media_type_overrides: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        let secrets = self.discover()?;
        if secrets.is_empty() {
            tracing::info!(root = %self.secret_root.display(), "No signing secrets found");
            return Ok(());
        }

        let image_ref = report.primary_tag().ok_or(SignerError::EmptyReport)?;
        if report.tags().len() > 1 {
            tracing::debug!(
                image = image_ref,
                skipped = ?&report.tags()[1..],
                "Signing first tag only"
            );
        }

        let _lock = SIGNING_ENV_LOCK.lock().await;

        for secret in &secrets {
            let repository = override_for(repository_overrides, &secret.name);
            let docker_media_types = override_for(media_type_overrides, &secret.name);

            tracing::info!(
                secret = %secret.name,
                key = %secret.key_path.display(),
                image = image_ref,
                "Signing image"
            );

            let request = SignRequest {
                key_opts: KeyOpts {
                    key_ref: secret.key_path.to_string_lossy().to_string(),
                    pass_func: secret.pass_func(),
                },
                annotations: annotations.cloned(),
                image_ref: image_ref.to_string(),
                cert_path: None,
                upload: true,
                payload_path: None,
                force: false,
                recursive: false,
            };

            let result = {
                let _env = SigningEnv::apply(repository, docker_media_types);
                self.capability.sign(request).await
            };

            if let Err(e) = result {
                tracing::warn!(secret = %secret.name, error = %e, "Signing failed");
                return Err(SignerError::Sign {
                    key_path: secret.key_path.clone(),
                    message: e.to_string(),
                });
            }
        }

        tracing::info!(image = image_ref, keys = secrets.len(), "Image signed");
        Ok(())
    }
}

fn override_for<'a>(overrides: Option<&'a HashMap<String, String>>, secret: &str) -> Option<&'a str> {
    overrides.and_then(|m| m.get(secret)).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cosigner_core::config::{COSIGN_DOCKER_MEDIA_TYPES_ENV, COSIGN_REPOSITORY_ENV};
    use serial_test::serial;
    use tempfile::TempDir;

    const IMAGE: &str = "example-registry.io/test:latest";

    #[derive(Debug, Clone)]
    struct RecordedCall {
        key_ref: String,
        password: Vec<u8>,
        annotations: Option<Annotations>,
        image_ref: String,
        repository: Option<String>,
        docker_media_types: Option<String>,
        cert_path: Option<PathBuf>,
        upload: bool,
        payload_path: Option<PathBuf>,
        force: bool,
        recursive: bool,
    }

    /// Records every request and the override variables visible during it.
    #[derive(Default)]
    struct RecordingCapability {
        calls: parking_lot::Mutex<Vec<RecordedCall>>,
        fail_with: Option<String>,
    }

    impl RecordingCapability {
        fn failing(message: &str) -> Self {
            Self {
                calls: Default::default(),
                fail_with: Some(message.to_string()),
            }
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SignCapability for RecordingCapability {
        async fn sign(&self, request: SignRequest) -> Result<()> {
            let password = (request.key_opts.pass_func)(true)?;
            self.calls.lock().push(RecordedCall {
                key_ref: request.key_opts.key_ref.clone(),
                password,
                annotations: request.annotations.clone(),
                image_ref: request.image_ref.clone(),
                repository: std::env::var(COSIGN_REPOSITORY_ENV).ok(),
                docker_media_types: std::env::var(COSIGN_DOCKER_MEDIA_TYPES_ENV).ok(),
                cert_path: request.cert_path.clone(),
                upload: request.upload,
                payload_path: request.payload_path.clone(),
                force: request.force,
                recursive: request.recursive,
            });
            match &self.fail_with {
                Some(message) => Err(SignerError::Other(message.clone())),
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        root: TempDir,
        report: ExportReport,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            for name in ["secret-name-1", "secret-name-2"] {
                let dir = root.path().join(name);
                std::fs::create_dir(&dir).unwrap();
                std::fs::write(dir.join("cosign.key"), b"").unwrap();
            }
            let report = ExportReport::from_toml_str(
                r#"[image]
tags = ["example-registry.io/test:latest", "example-registry.io/test:other-tag"]"#,
            )
            .unwrap();
            std::env::remove_var(COSIGN_REPOSITORY_ENV);
            std::env::remove_var(COSIGN_DOCKER_MEDIA_TYPES_ENV);
            Self { root, report }
        }

        fn key_path(&self, secret: &str) -> PathBuf {
            self.root.path().join(secret).join("cosign.key")
        }

        fn signer(&self, capability: Arc<RecordingCapability>) -> Signer {
            let config = SignerConfig {
                secret_root: self.root.path().to_path_buf(),
                ..Default::default()
            };
            Signer::new(&config, capability)
        }
    }

    fn assert_unset(name: &str) {
        assert!(std::env::var_os(name).is_none(), "{name} should be unset");
    }

    fn overrides(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    #[serial]
    async fn test_signs_images() {
        let fixture = Fixture::new();
        let capability = Arc::new(RecordingCapability::default());

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap();

        let calls = capability.calls();
        assert_eq!(calls.len(), 2);
        for (call, secret) in calls.iter().zip(["secret-name-1", "secret-name-2"]) {
            assert_eq!(call.image_ref, IMAGE);
            assert_eq!(call.key_ref, fixture.key_path(secret).to_string_lossy());
            assert!(call.key_ref.contains(&*fixture.root.path().to_string_lossy()));
            assert_eq!(call.password, Vec::<u8>::new());
            assert!(call.annotations.is_none());
            assert_eq!(call.cert_path, None);
            assert!(call.upload);
            assert_eq!(call.payload_path, None);
            assert!(!call.force);
            assert!(!call.recursive);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_signs_images_with_key_password() {
        let fixture = Fixture::new();
        let root = fixture.root.path();
        std::fs::write(root.join("secret-name-1/cosign.password"), b"secretPass1").unwrap();
        std::fs::write(root.join("secret-name-2/cosign.password"), b"secretPass2").unwrap();
        let capability = Arc::new(RecordingCapability::default());

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap();

        let passwords: Vec<Vec<u8>> = capability.calls().into_iter().map(|c| c.password).collect();
        assert_eq!(passwords, vec![b"secretPass1".to_vec(), b"secretPass2".to_vec()]);
    }

    #[tokio::test]
    #[serial]
    async fn test_signs_with_annotations() {
        let fixture = Fixture::new();
        let mut annotations = Annotations::new();
        annotations.insert("annotationKey1".to_string(), serde_json::json!("value1"));
        let capability = Arc::new(RecordingCapability::default());

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, Some(&annotations), None, None)
            .await
            .unwrap();

        let calls = capability.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!(call.annotations.as_ref(), Some(&annotations));
            assert_eq!(call.image_ref, IMAGE);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_errors_when_signing_fails() {
        let fixture = Fixture::new();
        let capability = Arc::new(RecordingCapability::failing("fake error"));

        let err = fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "unable to sign image with {}: fake error",
                fixture.key_path("secret-name-1").display()
            )
        );
        assert_eq!(capability.calls().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_failure_unsets_overrides() {
        let fixture = Fixture::new();
        let capability = Arc::new(RecordingCapability::failing("fake error"));
        let repositories = overrides(&[("secret-name-1", "registry.example.com/fakeproject")]);
        let media_types = overrides(&[("secret-name-1", "1")]);

        let result = fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, Some(&repositories), Some(&media_types))
            .await;

        assert!(result.is_err());
        let calls = capability.calls();
        assert_eq!(calls[0].repository.as_deref(), Some("registry.example.com/fakeproject"));
        assert_unset(COSIGN_REPOSITORY_ENV);
        assert_unset(COSIGN_DOCKER_MEDIA_TYPES_ENV);
    }

    #[tokio::test]
    #[serial]
    async fn test_sets_cosign_repository() {
        let fixture = Fixture::new();
        assert_unset(COSIGN_REPOSITORY_ENV);
        let capability = Arc::new(RecordingCapability::default());
        let repositories = overrides(&[("secret-name-1", "registry.example.com/fakeproject")]);

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, Some(&repositories), None)
            .await
            .unwrap();

        let calls = capability.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].repository.as_deref(), Some("registry.example.com/fakeproject"));
        assert_eq!(calls[1].repository, None);
        assert!(calls.iter().all(|c| c.docker_media_types.is_none()));
        assert_unset(COSIGN_REPOSITORY_ENV);
    }

    #[tokio::test]
    #[serial]
    async fn test_sets_cosign_docker_media_types() {
        let fixture = Fixture::new();
        assert_unset(COSIGN_DOCKER_MEDIA_TYPES_ENV);
        let capability = Arc::new(RecordingCapability::default());
        let media_types = overrides(&[("secret-name-1", "1")]);

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, Some(&media_types))
            .await
            .unwrap();

        let calls = capability.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].docker_media_types.as_deref(), Some("1"));
        assert_eq!(calls[1].docker_media_types, None);
        assert!(calls.iter().all(|c| c.repository.is_none()));
        assert_unset(COSIGN_DOCKER_MEDIA_TYPES_ENV);
    }

    #[tokio::test]
    #[serial]
    async fn test_sets_both_overrides() {
        let fixture = Fixture::new();
        let capability = Arc::new(RecordingCapability::default());
        let repositories = overrides(&[
            ("secret-name-1", "registry.example.com/fakeproject"),
            ("secret-name-2", "registry.example.com/fakeproject"),
        ]);
        let media_types = overrides(&[("secret-name-1", "1"), ("secret-name-2", "1")]);

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, Some(&repositories), Some(&media_types))
            .await
            .unwrap();

        let calls = capability.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!(call.repository.as_deref(), Some("registry.example.com/fakeproject"));
            assert_eq!(call.docker_media_types.as_deref(), Some("1"));
        }
        assert_unset(COSIGN_REPOSITORY_ENV);
        assert_unset(COSIGN_DOCKER_MEDIA_TYPES_ENV);
    }

    #[tokio::test]
    #[serial]
    async fn test_stale_override_is_cleared() {
        let fixture = Fixture::new();
        std::env::set_var(COSIGN_REPOSITORY_ENV, "stale.example.com/project");
        let capability = Arc::new(RecordingCapability::default());

        fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap();

        assert!(capability.calls().iter().all(|c| c.repository.is_none()));
        assert_unset(COSIGN_REPOSITORY_ENV);
    }

    #[tokio::test]
    #[serial]
    async fn test_no_secrets_is_noop() {
        let root = TempDir::new().unwrap();
        let capability = Arc::new(RecordingCapability::default());
        let config = SignerConfig {
            secret_root: root.path().to_path_buf(),
            ..Default::default()
        };

        Signer::new(&config, capability.clone())
            .sign(&ExportReport::default(), None, None, None)
            .await
            .unwrap();

        assert!(capability.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_empty_report_with_secrets_errors() {
        let fixture = Fixture::new();
        let capability = Arc::new(RecordingCapability::default());

        let err = fixture
            .signer(capability.clone())
            .sign(&ExportReport::default(), None, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, SignerError::EmptyReport));
        assert!(capability.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_key_aborts_before_signing() {
        let fixture = Fixture::new();
        std::fs::create_dir(fixture.root.path().join("secret-name-3")).unwrap();
        let capability = Arc::new(RecordingCapability::default());

        let err = fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, SignerError::MissingKey { .. }));
        assert!(capability.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_unreadable_password_fails_that_secret() {
        let fixture = Fixture::new();
        std::fs::create_dir(fixture.root.path().join("secret-name-1/cosign.password")).unwrap();
        let capability = Arc::new(RecordingCapability::default());

        let err = fixture
            .signer(capability.clone())
            .sign(&fixture.report, None, None, None)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with(&format!(
            "unable to sign image with {}: Failed to read key password",
            fixture.key_path("secret-name-1").display()
        )));
        assert!(capability.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_discover_matches_signing_order() {
        let fixture = Fixture::new();
        let signer = fixture.signer(Arc::new(RecordingCapability::default()));
        let names: Vec<String> = signer.discover().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["secret-name-1", "secret-name-2"]);
        assert_eq!(signer.secret_root(), fixture.root.path());
    }
}
