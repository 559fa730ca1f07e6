//! Grid manifest and registry types
//!
//! - [`grid`] - the desired state read from a grid manifest
//! - [`registry`] - the materialized state persisted in the registry file

mod grid;
mod registry;

pub use grid::{
    ClusterSpec, EksExistingClusterSpec, EksNewClusterSpec, EksSpec, Grid, GridManifest,
    GridMetadata, GridSpec,
};
pub use registry::{ClusterConfig, CredentialRefs, GridConfig, GridsConfig};

use serde::{Deserialize, Serialize};

/// Cloud provider a cluster runs on
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Amazon Web Services (EKS)
    Aws,
}

impl ProviderKind {
    /// Short provider tag used in registry entries and cluster names
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic cluster name for a provider, region and cluster identifier.
///
/// Repeated runs against the same spec must compute the same name so that
/// ensure lookups and teardown find the resources an earlier run created.
pub fn deterministic_cluster_name(provider: ProviderKind, region: &str, identifier: &str) -> String {
    format!("{}-{}-{}", provider.as_str(), region, identifier)
}
