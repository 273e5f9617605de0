//! Download artifact derivation.
//!
//! A [`DownloadArtifact`] is a time-bounded signed URL for one purchased
//! bundle, valid for one hour. It is derived, never stored: anyone holding a
//! valid purchase row can have one regenerated, but the settlement workflow
//! derives each exactly once.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use projecthub_core::ProjectId;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::DownloadArtifact;

/// Validity window of a signed download URL, in seconds.
pub const DOWNLOAD_TTL_SECS: u64 = 3600;

/// Errors from artifact derivation.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The expiry timestamp cannot be represented.
    #[error("expiry timestamp out of range")]
    ExpiryOutOfRange,
}

/// Seam for artifact derivation.
pub trait ArtifactSigner: Send + Sync {
    /// Derive a one-hour artifact for a bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`SignerError`] if the artifact cannot be derived.
    fn sign(&self, project_id: &ProjectId) -> Result<DownloadArtifact, SignerError>;
}

/// Signs download URLs with a keyed SHA-256 digest.
#[derive(Clone)]
pub struct DownloadSigner {
    base_url: String,
    secret: SecretString,
}

impl DownloadSigner {
    #[must_use]
    pub fn new(base_url: impl Into<String>, secret: SecretString) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, secret }
    }

    /// Derive an artifact expiring `DOWNLOAD_TTL_SECS` after `now`.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::ExpiryOutOfRange` if `now` is close enough to
    /// the end of representable time that the expiry overflows.
    pub fn sign_at(
        &self,
        project_id: &ProjectId,
        now: DateTime<Utc>,
    ) -> Result<DownloadArtifact, SignerError> {
        let ttl = i64::try_from(DOWNLOAD_TTL_SECS).map_err(|_| SignerError::ExpiryOutOfRange)?;
        let expires = now
            .timestamp()
            .checked_add(ttl)
            .ok_or(SignerError::ExpiryOutOfRange)?;

        let path = Self::bundle_path(project_id);
        let sig = self.signature(&path, expires);
        let download_url = format!("{}{path}?expires={expires}&sig={sig}", self.base_url);

        Ok(DownloadArtifact {
            project_id: project_id.clone(),
            download_url,
            expires_in_seconds: DOWNLOAD_TTL_SECS,
        })
    }

    /// Check a presented signature against a path and expiry.
    ///
    /// Used by the file-serving collaborator; expired URLs fail regardless
    /// of signature.
    #[must_use]
    pub fn verify(
        &self,
        project_id: &ProjectId,
        expires: i64,
        sig: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let expected = self.signature(&Self::bundle_path(project_id), expires);
        expected == sig
    }

    fn bundle_path(project_id: &ProjectId) -> String {
        format!("/files/{project_id}/project-files.zip")
    }

    fn signature(&self, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(expires.to_be_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl ArtifactSigner for DownloadSigner {
    fn sign(&self, project_id: &ProjectId) -> Result<DownloadArtifact, SignerError> {
        self.sign_at(project_id, Utc::now())
    }
}
