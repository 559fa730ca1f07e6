//! AWS credentials for EKS provisioning
//!
//! Every call against a new cluster uses static credentials resolved from the
//! grid manifest; no ambient credential chain is consulted.

use crate::secret::SecretRef;
use crate::{Error, Result};

/// Environment variable carrying the access key id in generated kubeconfigs
pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable carrying the secret access key in generated kubeconfigs
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Static AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// AWS access key ID
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
}

impl AwsCredentials {
    /// Create credentials from literal values
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Resolve both halves from manifest secret references.
    ///
    /// Stops at the first reference that fails to resolve.
    pub fn resolve(access_key_id: &SecretRef, secret_access_key: &SecretRef) -> Result<Self> {
        let access_key_id = access_key_id
            .resolve()
            .map_err(|e| with_context("access key id", e))?;
        let secret_access_key = secret_access_key
            .resolve()
            .map_err(|e| with_context("secret access key", e))?;
        Ok(Self::new(access_key_id, secret_access_key))
    }
}

fn with_context(what: &str, err: Error) -> Error {
    match err {
        Error::SecretResolution(msg) => Error::secret(format!("failed to read {}: {}", what, msg)),
        other => other,
    }
}

// Keep the secret half out of logs and panic messages.
impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}
