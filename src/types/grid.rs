//! Grid manifest types
//!
//! The manifest keeps the nested-optional wire shape users write:
//!
//! ```yaml
//! apiVersion: kubectl-grid.replicated.com/v1alpha1
//! kind: Grid
//! metadata:
//!   name: g1
//! spec:
//!   clusters:
//!     - eks:
//!         existingCluster:
//!           region: us-west-2
//!           clusterName: c1
//!           accessKeyId:
//!             value: AK
//!           secretAccessKey:
//!             valueFrom:
//!               osEnv: AWS_SECRET_ACCESS_KEY
//! ```
//!
//! In memory each cluster entry is a closed tagged union, so a provider or
//! variant that is unset, or ambiguous, is rejected while parsing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{deterministic_cluster_name, ProviderKind};
use crate::secret::SecretRef;
use crate::{Error, Result};

/// API version written into generated manifests
pub const GRID_API_VERSION: &str = "kubectl-grid.replicated.com/v1alpha1";

/// A named collection of desired clusters
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    /// Unique grid name
    pub name: String,
    /// Desired clusters, in manifest order
    pub clusters: Vec<ClusterSpec>,
}

impl Grid {
    /// Create a grid from a name and its clusters
    pub fn new(name: impl Into<String>, clusters: Vec<ClusterSpec>) -> Self {
        Self {
            name: name.into(),
            clusters,
        }
    }

    /// Parse a YAML grid manifest
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: GridManifest = serde_yaml::from_str(yaml)
            .map_err(|e| Error::validation(format!("invalid grid manifest: {}", e)))?;
        Ok(manifest.into())
    }

    /// Check everything that can be checked before any cluster work starts
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("grid name must not be empty"));
        }

        let mut names = HashSet::new();
        for cluster in &self.clusters {
            cluster.validate()?;
            let name = cluster.deterministic_name(&self.name);
            if !names.insert(name.clone()) {
                return Err(Error::validation(format!(
                    "grid {} contains two clusters named {}",
                    self.name, name
                )));
            }
        }

        Ok(())
    }
}

/// Grid manifest document
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridManifest {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind (always "Grid")
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Grid metadata
    pub metadata: GridMetadata,
    /// Grid spec
    pub spec: GridSpec,
}

fn default_api_version() -> String {
    GRID_API_VERSION.to_string()
}

fn default_kind() -> String {
    "Grid".to_string()
}

/// Grid manifest metadata
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct GridMetadata {
    /// Grid name
    #[serde(default)]
    pub name: String,
}

/// Grid manifest spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct GridSpec {
    /// Cluster entries
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
}

impl From<GridManifest> for Grid {
    fn from(manifest: GridManifest) -> Self {
        Grid::new(manifest.metadata.name, manifest.spec.clusters)
    }
}

impl From<&Grid> for GridManifest {
    fn from(grid: &Grid) -> Self {
        GridManifest {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: GridMetadata {
                name: grid.name.clone(),
            },
            spec: GridSpec {
                clusters: grid.clusters.clone(),
            },
        }
    }
}

/// A desired cluster, by provider
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(try_from = "ClusterSpecWire", into = "ClusterSpecWire")]
pub enum ClusterSpec {
    /// Amazon EKS
    Eks(EksSpec),
}

/// An EKS cluster, either connected to or created
#[derive(Clone, Debug, PartialEq)]
pub enum EksSpec {
    /// A cluster this system connects to but does not own
    Existing(EksExistingClusterSpec),
    /// A cluster this system creates and owns for deletion
    New(EksNewClusterSpec),
}

/// An EKS cluster that already exists
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EksExistingClusterSpec {
    /// AWS region of the cluster
    pub region: String,
    /// EKS cluster name
    pub cluster_name: String,
    /// AWS access key id
    pub access_key_id: SecretRef,
    /// AWS secret access key
    pub secret_access_key: SecretRef,
}

/// An EKS cluster to create
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EksNewClusterSpec {
    /// AWS region to create the cluster in
    pub region: String,
    /// Kubernetes version (EKS default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Cluster identifier; the grid name is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// AWS access key id
    pub access_key_id: SecretRef,
    /// AWS secret access key
    pub secret_access_key: SecretRef,
}

impl ClusterSpec {
    /// Provider this cluster runs on
    pub fn provider(&self) -> ProviderKind {
        match self {
            ClusterSpec::Eks(_) => ProviderKind::Aws,
        }
    }

    /// Region the cluster lives in
    pub fn region(&self) -> &str {
        match self {
            ClusterSpec::Eks(EksSpec::Existing(s)) => &s.region,
            ClusterSpec::Eks(EksSpec::New(s)) => &s.region,
        }
    }

    /// Whether the cluster is connected to rather than created
    pub fn is_existing(&self) -> bool {
        matches!(self, ClusterSpec::Eks(EksSpec::Existing(_)))
    }

    /// Cluster identifier the deterministic name is derived from
    pub fn identifier<'a>(&'a self, grid_name: &'a str) -> &'a str {
        match self {
            ClusterSpec::Eks(EksSpec::Existing(s)) => &s.cluster_name,
            ClusterSpec::Eks(EksSpec::New(s)) => s.name.as_deref().unwrap_or(grid_name),
        }
    }

    /// Deterministic name of this cluster within `grid_name`
    pub fn deterministic_name(&self, grid_name: &str) -> String {
        deterministic_cluster_name(self.provider(), self.region(), self.identifier(grid_name))
    }

    fn validate(&self) -> Result<()> {
        if self.region().trim().is_empty() {
            return Err(Error::validation("cluster region must not be empty"));
        }
        match self {
            ClusterSpec::Eks(EksSpec::Existing(s)) if s.cluster_name.trim().is_empty() => Err(
                Error::validation("existing eks cluster must set clusterName"),
            ),
            ClusterSpec::Eks(EksSpec::New(s))
                if s.name.as_deref().is_some_and(|n| n.trim().is_empty()) =>
            {
                Err(Error::validation("new eks cluster name must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ClusterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterSpec::Eks(EksSpec::Existing(s)) => {
                write!(f, "existing eks cluster {} in {}", s.cluster_name, s.region)
            }
            ClusterSpec::Eks(EksSpec::New(s)) => match &s.name {
                Some(name) => write!(f, "new eks cluster {} in {}", name, s.region),
                None => write!(f, "new eks cluster in {}", s.region),
            },
        }
    }
}

// =============================================================================
// Wire form
// =============================================================================

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct ClusterSpecWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    eks: Option<EksSpecWire>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct EksSpecWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    existing_cluster: Option<EksExistingClusterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_cluster: Option<EksNewClusterSpec>,
}

impl TryFrom<ClusterSpecWire> for ClusterSpec {
    type Error = Error;

    fn try_from(wire: ClusterSpecWire) -> Result<Self> {
        let eks = wire
            .eks
            .ok_or_else(|| Error::validation("unknown cluster: no provider set"))?;

        match (eks.existing_cluster, eks.new_cluster) {
            (Some(existing), None) => Ok(ClusterSpec::Eks(EksSpec::Existing(existing))),
            (None, Some(new)) => Ok(ClusterSpec::Eks(EksSpec::New(new))),
            (Some(_), Some(_)) => Err(Error::validation(
                "eks cluster must specify new or existing, not both",
            )),
            (None, None) => Err(Error::validation(
                "eks cluster must specify new or existing",
            )),
        }
    }
}

impl From<ClusterSpec> for ClusterSpecWire {
    fn from(spec: ClusterSpec) -> Self {
        match spec {
            ClusterSpec::Eks(EksSpec::Existing(existing)) => ClusterSpecWire {
                eks: Some(EksSpecWire {
                    existing_cluster: Some(existing),
                    new_cluster: None,
                }),
            },
            ClusterSpec::Eks(EksSpec::New(new)) => ClusterSpecWire {
                eks: Some(EksSpecWire {
                    existing_cluster: None,
                    new_cluster: Some(new),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXISTING_MANIFEST: &str = r#"
apiVersion: kubectl-grid.replicated.com/v1alpha1
kind: Grid
metadata:
  name: g1
spec:
  clusters:
    - eks:
        existingCluster:
          region: us-west-2
          clusterName: c1
          accessKeyId:
            value: AK
          secretAccessKey:
            value: SK
"#;

    fn new_cluster(region: &str, name: Option<&str>) -> ClusterSpec {
        ClusterSpec::Eks(EksSpec::New(EksNewClusterSpec {
            region: region.to_string(),
            version: None,
            name: name.map(str::to_string),
            access_key_id: SecretRef::literal("AK"),
            secret_access_key: SecretRef::literal("SK"),
        }))
    }

    #[test]
    fn parses_existing_cluster_manifest() {
        let grid = Grid::from_yaml(EXISTING_MANIFEST).unwrap();
        assert_eq!(grid.name, "g1");
        assert_eq!(grid.clusters.len(), 1);

        let ClusterSpec::Eks(EksSpec::Existing(spec)) = &grid.clusters[0] else {
            panic!("expected existing eks cluster");
        };
        assert_eq!(spec.cluster_name, "c1");
        assert_eq!(spec.access_key_id, SecretRef::literal("AK"));
        assert!(grid.clusters[0].is_existing());
        assert_eq!(grid.clusters[0].deterministic_name(&grid.name), "aws-us-west-2-c1");
    }

    #[test]
    fn rejects_cluster_without_provider() {
        let yaml = "metadata:\n  name: g1\nspec:\n  clusters:\n    - {}\n";
        let err = Grid::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown cluster"));
    }

    #[test]
    fn rejects_eks_without_variant() {
        let yaml = "metadata:\n  name: g1\nspec:\n  clusters:\n    - eks: {}\n";
        let err = Grid::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("must specify new or existing"));
    }

    #[test]
    fn rejects_eks_with_both_variants() {
        let yaml = r#"
metadata:
  name: g1
spec:
  clusters:
    - eks:
        existingCluster:
          region: us-west-2
          clusterName: c1
          accessKeyId: {value: AK}
          secretAccessKey: {value: SK}
        newCluster:
          region: us-west-2
          accessKeyId: {value: AK}
          secretAccessKey: {value: SK}
"#;
        let err = Grid::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn manifest_serializes_back_to_nested_shape() {
        let grid = Grid::from_yaml(EXISTING_MANIFEST).unwrap();
        let yaml = serde_yaml::to_string(&GridManifest::from(&grid)).unwrap();
        assert!(yaml.contains("existingCluster"));
        assert!(!yaml.contains("newCluster"));
        assert_eq!(Grid::from_yaml(&yaml).unwrap(), grid);
    }

    #[test]
    fn new_cluster_identifier_defaults_to_grid_name() {
        let spec = new_cluster("us-east-1", None);
        assert_eq!(spec.deterministic_name("g1"), "aws-us-east-1-g1");
        assert!(!spec.is_existing());

        let named = new_cluster("us-east-1", Some("blue"));
        assert_eq!(named.deterministic_name("g1"), "aws-us-east-1-blue");
    }

    #[test]
    fn validate_rejects_colliding_cluster_names() {
        let grid = Grid::new(
            "g1",
            vec![new_cluster("us-east-1", None), new_cluster("us-east-1", None)],
        );
        let err = grid.validate().unwrap_err();
        assert!(err.to_string().contains("aws-us-east-1-g1"));

        let grid = Grid::new(
            "g1",
            vec![
                new_cluster("us-east-1", Some("a")),
                new_cluster("us-east-1", Some("b")),
            ],
        );
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_names() {
        assert!(Grid::new(" ", vec![]).validate().is_err());
        assert!(Grid::new("g1", vec![new_cluster("", None)]).validate().is_err());
        assert!(Grid::new("g1", vec![new_cluster("us-east-1", Some(""))])
            .validate()
            .is_err());
    }
}
