//! Obtaining a fresh signed key

use std::path::Path;

use chatca_core::{MessagingChannel, SignatureRequest, SignatureResponse};
use chatca_signing::certificate::read_certificate;
use chatca_signing::{certificate_path, is_valid_cert, SshKeygen};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::requester::Requester;

/// Whether the key at `key_path` has a certificate that can be used now.
///
/// A non-empty `requested_principal` must also be among the certificate's
/// principals, otherwise a fresh request has to go through the authority.
pub fn has_usable_certificate(key_path: &Path, requested_principal: &str) -> bool {
    if !is_valid_cert(key_path) {
        return false;
    }
    if !requested_principal.is_empty() {
        match read_certificate(key_path) {
            Ok(info) if info.principals.iter().any(|p| p == requested_principal) => {}
            Ok(_) => {
                debug!(principal = requested_principal, "cached certificate lacks requested principal");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "cached certificate unreadable");
                return false;
            }
        }
    }
    debug!(path = %key_path.display(), "reusing unexpired certificate");
    true
}

/// Generate a new key at `key_path`, have it signed and store the certificate.
///
/// Any existing key, public key and certificate at that path are replaced.
pub async fn provision_new_key<C>(
    requester: &Requester<C>,
    keygen: &SshKeygen,
    key_path: &Path,
    requested_principal: &str,
) -> Result<SignatureResponse>
where
    C: MessagingChannel + 'static,
{
    debug!(path = %key_path.display(), "generating a new SSH key");
    let public_key = keygen.generate_key(key_path, true).await?;

    let request = SignatureRequest::new(public_key, Uuid::new_v4().to_string())
        .with_requested_principal(requested_principal);
    debug!(uuid = %request.uuid, bot = %requester.config().bot_name, "requesting signature");
    let response = requester.request_signature(&request).await?;

    let cert_path = certificate_path(key_path);
    tokio::fs::write(&cert_path, format!("{}\n", response.signed_key.trim())).await?;
    restrict_permissions(&cert_path)?;
    info!(path = %cert_path.display(), "stored signed certificate");
    Ok(response)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_is_not_usable() {
        let temp = TempDir::new().unwrap();
        assert!(!has_usable_certificate(&temp.path().join("key"), ""));
    }

    #[tokio::test]
    async fn test_requested_principal_must_be_in_cached_certificate() {
        let tool = SshKeygen::new();
        if !tool.is_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let ca = temp.path().join("ca");
        let key = temp.path().join("keybase-signed-key--cabot");
        tool.generate_key(&ca, false).await.unwrap();
        tool.generate_key(&key, false).await.unwrap();

        let status = tokio::process::Command::new("ssh-keygen")
            .arg("-s")
            .arg(&ca)
            .args(["-I", "test", "-n", "infra.ssh", "-V", "-1m:+1h", "-q"])
            .arg(chatca_signing::public_key_path(&key))
            .status()
            .await
            .unwrap();
        assert!(status.success());

        assert!(has_usable_certificate(&key, ""));
        assert!(has_usable_certificate(&key, "infra.ssh"));
        assert!(!has_usable_certificate(&key, "infra.ssh.root"));
    }
}
