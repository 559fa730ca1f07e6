//! Error types for grid operations

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ClusterConfig;

/// Main error type for grid operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Manifest or grid validation error, raised before any cluster work starts
    #[error("validation error: {0}")]
    Validation(String),

    /// A grid with this name is already registered
    #[error(
        "grid with name {name} already exists. if you want to delete it, run kubectl grid delete {name}"
    )]
    GridAlreadyExists {
        /// Name of the conflicting grid
        name: String,
    },

    /// No grid with this name is registered
    #[error("grid not found: {name}")]
    GridNotFound {
        /// Name of the missing grid
        name: String,
    },

    /// A secret reference could not be resolved to a literal value
    #[error("secret resolution error: {0}")]
    SecretResolution(String),

    /// Cloud provider call failed
    #[error("provider error: {0}")]
    Provider(String),

    /// A cloud resource did not reach its ready state within the timeout
    #[error("{resource} did not become ready")]
    NotReady {
        /// The resource that was being waited on
        resource: String,
    },

    /// Registry file could not be read, written or locked
    #[error("registry error at {path}: {message}")]
    Registry {
        /// Path of the registry file
        path: PathBuf,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Provisioning stopped after the cluster was created in the cloud
    #[error("{source}")]
    Incomplete {
        /// Record of the created cluster, sufficient to tear it down
        cluster: Box<ClusterConfig>,
        /// Why provisioning stopped
        source: Box<Error>,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a provider error with the given message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a secret resolution error with the given message
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::SecretResolution(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a readiness timeout error for the given resource
    pub fn not_ready(resource: impl Into<String>) -> Self {
        Self::NotReady {
            resource: resource.into(),
        }
    }

    /// Wrap `source` with the record of a cluster that was created before it
    pub fn incomplete(cluster: ClusterConfig, source: Error) -> Self {
        Self::Incomplete {
            cluster: Box::new(cluster),
            source: Box::new(source),
        }
    }

    /// Create a registry error for the given path
    pub fn registry(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Registry {
            path: path.into(),
            message: msg.into(),
        }
    }
}
