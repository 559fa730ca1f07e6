//! Registry records
//!
//! One [`GridConfig`] per grid, holding one [`ClusterConfig`] per cluster that
//! finished provisioning or that was created and then failed to become ready.
//! Created empty when a grid-create run starts and removed when grid-delete
//! completes.

use serde::{Deserialize, Serialize};

use super::{deterministic_cluster_name, ProviderKind};
use crate::secret::SecretRef;

/// Everything in the registry file
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct GridsConfig {
    /// Registered grids
    #[serde(rename = "grids", default, skip_serializing_if = "Vec::is_empty")]
    pub grids: Vec<GridConfig>,
}

impl GridsConfig {
    /// Find a grid by name
    pub fn find(&self, name: &str) -> Option<&GridConfig> {
        self.grids.iter().find(|g| g.name == name)
    }

    /// Find a grid by name for mutation
    pub fn find_mut(&mut self, name: &str) -> Option<&mut GridConfig> {
        self.grids.iter_mut().find(|g| g.name == name)
    }

    /// Whether a grid with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Remove a grid by name, returning it if it was present
    pub fn remove(&mut self, name: &str) -> Option<GridConfig> {
        let index = self.grids.iter().position(|g| g.name == name)?;
        Some(self.grids.remove(index))
    }
}

/// A registered grid and its materialized clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct GridConfig {
    /// Grid name
    pub name: String,
    /// Clusters appended by their provisioning tasks
    #[serde(rename = "clusters", default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterConfig>,
}

impl GridConfig {
    /// An empty grid entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clusters: Vec::new(),
        }
    }

    /// Clusters this system created and is therefore allowed to delete
    pub fn owned_clusters(&self) -> impl Iterator<Item = &ClusterConfig> {
        self.clusters.iter().filter(|c| !c.is_existing)
    }
}

/// A provisioned cluster and how to reach it
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Deterministic cluster name
    pub name: String,
    /// Cloud provider
    pub provider: ProviderKind,
    /// True when the cluster was connected to rather than created; such
    /// clusters are never deleted by this system
    pub is_existing: bool,
    /// Region
    pub region: String,
    /// Identifier the deterministic name was derived from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identifier: String,
    /// Connection descriptor (kubeconfig)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    /// Credentials a created cluster was provisioned with, kept for teardown
    /// when no kubeconfig could be rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialRefs>,
}

/// Manifest secret references for a cluster's cloud credentials
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRefs {
    /// Access key id reference
    pub access_key_id: SecretRef,
    /// Secret access key reference
    pub secret_access_key: SecretRef,
}

impl ClusterConfig {
    /// Recompute the deterministic name from provider, region and identifier
    ///
    /// Entries written without an identifier fall back to the stored name.
    pub fn deterministic_name(&self) -> String {
        if self.identifier.is_empty() {
            return self.name.clone();
        }
        deterministic_cluster_name(self.provider, &self.region, &self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(identifier: &str, is_existing: bool) -> ClusterConfig {
        ClusterConfig {
            name: deterministic_cluster_name(ProviderKind::Aws, "us-west-2", identifier),
            provider: ProviderKind::Aws,
            is_existing,
            region: "us-west-2".to_string(),
            identifier: identifier.to_string(),
            kubeconfig: None,
            credentials: None,
        }
    }

    #[test]
    fn wire_format_uses_registry_field_names() {
        let config = GridsConfig {
            grids: vec![GridConfig {
                name: "g1".to_string(),
                clusters: vec![cluster("c1", true)],
            }],
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("grids:"));
        assert!(yaml.contains("clusters:"));
        assert!(yaml.contains("isExisting: true"));
        assert!(yaml.contains("provider: aws"));
        assert!(!yaml.contains("kubeconfig"));

        let parsed: GridsConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn empty_registry_parses_from_empty_mapping() {
        let parsed: GridsConfig = serde_yaml::from_str("{}").unwrap();
        assert!(parsed.grids.is_empty());
    }

    #[test]
    fn owned_clusters_skip_existing() {
        let grid = GridConfig {
            name: "g1".to_string(),
            clusters: vec![cluster("a", true), cluster("b", false)],
        };
        let owned: Vec<_> = grid.owned_clusters().map(|c| c.identifier.as_str()).collect();
        assert_eq!(owned, vec!["b"]);
    }

    #[test]
    fn credential_refs_persist_without_resolving() {
        let config = ClusterConfig {
            credentials: Some(CredentialRefs {
                access_key_id: SecretRef::literal("AK"),
                secret_access_key: SecretRef::from_env("GRID_SECRET"),
            }),
            ..cluster("c1", false)
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("accessKeyId:"));
        assert!(yaml.contains("osEnv: GRID_SECRET"));

        let parsed: ClusterConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn remove_returns_the_grid() {
        let mut config = GridsConfig {
            grids: vec![GridConfig::new("a"), GridConfig::new("b")],
        };
        assert_eq!(config.remove("a").map(|g| g.name), Some("a".to_string()));
        assert!(!config.contains("a"));
        assert!(config.contains("b"));
        assert!(config.remove("missing").is_none());
    }

    #[test]
    fn deterministic_name_recomputes_from_parts() {
        let c = cluster("c1", false);
        assert_eq!(c.deterministic_name(), "aws-us-west-2-c1");

        let legacy = ClusterConfig {
            identifier: String::new(),
            name: "aws-us-west-2-legacy".to_string(),
            ..c
        };
        assert_eq!(legacy.deterministic_name(), "aws-us-west-2-legacy");
    }
}
