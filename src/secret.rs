//! Secret references in grid manifests
//!
//! Credentials in a manifest are either given literally or indirected through
//! an external source:
//!
//! ```yaml
//! accessKeyId:
//!   value: AKIA...
//! secretAccessKey:
//!   valueFrom:
//!     osEnv: AWS_SECRET_ACCESS_KEY
//! ```
//!
//! References are resolved on every use; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A credential value, either literal or read from an external source
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Literal value. Takes precedence over `value_from` when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Indirection to an external source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFrom>,
}

/// External source for a secret value
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValueFrom {
    /// Name of an environment variable holding the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_env: Option<String>,
}

impl SecretRef {
    /// Reference holding a literal value
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// Reference to an environment variable
    pub fn from_env(name: impl Into<String>) -> Self {
        Self {
            value: None,
            value_from: Some(ValueFrom {
                os_env: Some(name.into()),
            }),
        }
    }

    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<String> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` to read environment variables.
    ///
    /// A literal value wins even if the indirection points at an unset
    /// variable. An unset variable, or a reference with neither form set,
    /// is an error.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            return Ok(value.to_string());
        }

        let env_name = self
            .value_from
            .as_ref()
            .and_then(|from| from.os_env.as_deref())
            .filter(|name| !name.is_empty());

        match env_name {
            Some(name) => lookup(name)
                .ok_or_else(|| Error::secret(format!("environment variable {} is not set", name))),
            None => Err(Error::secret("value or valueFrom must be set")),
        }
    }
}
