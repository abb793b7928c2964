use crate::{
    config::Config,
    emitter::MetricEmitter,
    error::{CoreError, Result},
    inspector::ResourceInspector,
    model::MetricRecord,
};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

/// Which credential source ended up active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    KeyFile,
    InlineKey,
    NoCredentials,
    ActivationFailed,
}

impl AuthStatus {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::KeyFile | Self::InlineKey)
    }
}

/// Owns the temporary key file written from an inline payload and deletes
/// it when cleaned up or dropped
#[derive(Debug, Default)]
pub struct CredentialGuard {
    temp: Option<TempPath>,
}

impl CredentialGuard {
    pub fn path(&self) -> Option<&Path> {
        self.temp.as_deref()
    }

    pub fn cleanup(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => debug!(path = %path.display(), "removed temporary credential file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temporary credential file"),
            }
        }
    }
}

impl Drop for CredentialGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Activates exactly one credential source through the inspector
pub struct Authenticator<'a, I: ResourceInspector + ?Sized> {
    config: &'a Config,
    inspector: &'a I,
}

impl<'a, I: ResourceInspector + ?Sized> Authenticator<'a, I> {
    pub fn new(config: &'a Config, inspector: &'a I) -> Self {
        Self { config, inspector }
    }

    /// Key file first, inline payload second. Failures are reported as
    /// `Setup Error` metrics; the returned error is only for emit failures.
    pub fn activate<W: Write>(
        &self,
        emitter: &mut MetricEmitter<W>,
        guard: &mut CredentialGuard,
    ) -> Result<AuthStatus> {
        let status = match self.existing_key_file() {
            Some(path) => self.activate_from(&path, AuthStatus::KeyFile),
            None => match &self.config.credentials_json {
                Some(payload) if !payload.expose().trim().is_empty() => {
                    match write_temp_key(payload.expose()) {
                        Ok(temp) => {
                            let path = temp.to_path_buf();
                            guard.temp = Some(temp);
                            self.activate_from(&path, AuthStatus::InlineKey)
                        }
                        Err(e) => {
                            error!(error = %e, "could not stage inline credentials");
                            AuthStatus::ActivationFailed
                        }
                    }
                }
                _ => AuthStatus::NoCredentials,
            },
        };

        match status {
            AuthStatus::NoCredentials => {
                error!("no usable credential source");
                emitter.emit(&MetricRecord::new(["Setup Error", "No Credentials"], 1.0))?;
                emitter.emit(&MetricRecord::new(["Setup Error", "Authentication Failed"], 1.0))?;
            }
            AuthStatus::ActivationFailed => {
                emitter.emit(&MetricRecord::new(["Setup Error", "Authentication Failed"], 1.0))?;
            }
            AuthStatus::KeyFile | AuthStatus::InlineKey => {
                info!(source = ?status, "credentials activated");
            }
        }

        Ok(status)
    }

    fn existing_key_file(&self) -> Option<PathBuf> {
        let path = self.config.credentials_file.as_ref()?;
        if path.as_os_str().is_empty() {
            return None;
        }
        if path.is_file() {
            Some(path.clone())
        } else {
            warn!(path = %path.display(), "credential file not found");
            None
        }
    }

    fn activate_from(&self, path: &Path, source: AuthStatus) -> AuthStatus {
        match self.inspector.activate_service_account(path) {
            Ok(()) => source,
            Err(e) => {
                error!(error = %e, "service account activation failed");
                AuthStatus::ActivationFailed
            }
        }
    }
}

/// Write the payload to an owner-only temp file named after this process
fn write_temp_key(payload: &str) -> Result<TempPath> {
    let prefix = format!("pubmon-key-{}-", std::process::id());
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".json");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o600));
    }

    let mut file = builder
        .tempfile()
        .map_err(|e| CoreError::credentials(format!("failed to create temp key file: {}", e)))?;
    file.write_all(payload.as_bytes())?;
    file.flush()?;

    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CredentialPayload, inspector::fake::FakeInspector};

    fn base_config() -> Config {
        Config {
            project_id: "acme".to_string(),
            ..Config::default()
        }
    }

    fn emitter() -> MetricEmitter<Vec<u8>> {
        MetricEmitter::new("P", Vec::new())
    }

    fn output(e: MetricEmitter<Vec<u8>>) -> String {
        String::from_utf8(e.into_inner()).unwrap()
    }

    #[test]
    fn test_existing_key_file_used_directly() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            credentials_file: Some(key.path().to_path_buf()),
            credentials_json: Some(CredentialPayload::new("{}")),
            ..base_config()
        };
        let inspector = FakeInspector::reachable();
        let mut guard = CredentialGuard::default();
        let mut e = emitter();

        let status = Authenticator::new(&config, &inspector)
            .activate(&mut e, &mut guard)
            .unwrap();

        assert_eq!(status, AuthStatus::KeyFile);
        assert!(guard.path().is_none());
        assert_eq!(inspector.activated_with.borrow().as_deref(), Some(key.path()));
        assert_eq!(e.emitted(), 0);
    }

    #[test]
    fn test_inline_payload_staged_and_removed() {
        let config = Config {
            credentials_file: Some(PathBuf::from("/nonexistent/key.json")),
            credentials_json: Some(CredentialPayload::new("{\"type\":\"service_account\"}")),
            ..base_config()
        };
        let inspector = FakeInspector::reachable();
        let mut guard = CredentialGuard::default();
        let mut e = emitter();

        let status = Authenticator::new(&config, &inspector)
            .activate(&mut e, &mut guard)
            .unwrap();
        assert_eq!(status, AuthStatus::InlineKey);

        let staged = guard.path().unwrap().to_path_buf();
        assert!(staged.exists());
        assert!(staged
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("pubmon-key-{}-", std::process::id())));
        assert_eq!(
            std::fs::read_to_string(&staged).unwrap(),
            "{\"type\":\"service_account\"}"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&staged).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        drop(guard);
        assert!(!staged.exists());
    }

    #[test]
    fn test_no_source_reports_setup_errors() {
        let config = Config {
            credentials_file: Some(PathBuf::from("/nonexistent/key.json")),
            ..base_config()
        };
        let inspector = FakeInspector::reachable();
        let mut guard = CredentialGuard::default();
        let mut e = emitter();

        let status = Authenticator::new(&config, &inspector)
            .activate(&mut e, &mut guard)
            .unwrap();

        assert_eq!(status, AuthStatus::NoCredentials);
        assert_eq!(inspector.call_count("activate"), 0);
        let out = output(e);
        assert!(out.contains("name=P|Setup Error|No Credentials, value=1"));
        assert!(out.contains("name=P|Setup Error|Authentication Failed, value=1"));
    }

    #[test]
    fn test_activation_failure_reported() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            credentials_file: Some(key.path().to_path_buf()),
            ..base_config()
        };
        let inspector = FakeInspector {
            activation_fails: true,
            ..FakeInspector::reachable()
        };
        let mut guard = CredentialGuard::default();
        let mut e = emitter();

        let status = Authenticator::new(&config, &inspector)
            .activate(&mut e, &mut guard)
            .unwrap();

        assert_eq!(status, AuthStatus::ActivationFailed);
        assert!(!status.is_authenticated());
        let out = output(e);
        assert!(out.contains("Authentication Failed, value=1"));
        assert!(!out.contains("No Credentials"));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut guard = CredentialGuard {
            temp: Some(write_temp_key("{}").unwrap()),
        };
        let path = guard.path().unwrap().to_path_buf();
        guard.cleanup();
        guard.cleanup();
        assert!(!path.exists());
    }
}
