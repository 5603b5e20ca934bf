//! Issued certificate inspection and local reuse check

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ssh_key::Certificate;
use tracing::debug;

use crate::error::{Result, SigningError};

/// Fields of an issued certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Embedded key id
    pub key_id: String,

    /// Valid principals
    pub principals: Vec<String>,

    /// Start of validity, unix seconds
    pub valid_after: u64,

    /// End of validity, unix seconds
    pub valid_before: u64,
}

impl CertificateInfo {
    /// Whether `now` (unix seconds) lies strictly inside the validity window
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.valid_after < now && now < self.valid_before
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `<key>.pub`
pub fn public_key_path(key_path: &Path) -> PathBuf {
    with_suffix(key_path, ".pub")
}

/// `<key>-cert.pub`
pub fn certificate_path(key_path: &Path) -> PathBuf {
    with_suffix(key_path, "-cert.pub")
}

/// Parse OpenSSH certificate text
pub fn parse_certificate(text: &str) -> Result<CertificateInfo> {
    let cert = Certificate::from_openssh(text.trim()).map_err(|e| {
        SigningError::InvalidCertificate {
            path: PathBuf::new(),
            reason: e.to_string(),
        }
    })?;

    Ok(CertificateInfo {
        key_id: cert.key_id().to_string(),
        principals: cert.valid_principals().to_vec(),
        valid_after: cert.valid_after(),
        valid_before: cert.valid_before(),
    })
}

/// Read and parse the certificate stored next to `key_path`
pub fn read_certificate(key_path: &Path) -> Result<CertificateInfo> {
    let path = certificate_path(key_path);
    let text = std::fs::read_to_string(&path)?;
    parse_certificate(&text).map_err(|e| match e {
        SigningError::InvalidCertificate { reason, .. } => {
            SigningError::InvalidCertificate { path, reason }
        }
        other => other,
    })
}

/// Whether a cached certificate at `key_path` can be reused right now
pub fn is_valid_cert(key_path: &Path) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    is_valid_cert_at(key_path, now)
}

/// Whether the private key, public key and certificate all exist and the
/// certificate is valid at `now` (unix seconds)
pub fn is_valid_cert_at(key_path: &Path, now: u64) -> bool {
    let required = [
        key_path.to_path_buf(),
        public_key_path(key_path),
        certificate_path(key_path),
    ];
    if let Some(missing) = required.iter().find(|p| !p.exists()) {
        debug!(path = %missing.display(), "cached key material missing");
        return false;
    }

    match read_certificate(key_path) {
        Ok(info) => info.is_valid_at(now),
        Err(e) => {
            debug!(error = %e, "cached certificate unusable");
            false
        }
    }
}
