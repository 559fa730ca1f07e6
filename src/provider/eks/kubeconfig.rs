//! Connection descriptors for EKS clusters
//!
//! Generates a kubeconfig with a single cluster entry, a context binding it
//! to a single user, and a user whose token comes from
//! `aws eks get-token --cluster-name <name>` run with the cluster's
//! credentials as environment overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::credentials::{AwsCredentials, ACCESS_KEY_ID_ENV, SECRET_ACCESS_KEY_ENV};
use crate::{Error, Result};

const CLUSTER_ENTRY_NAME: &str = "kubernetes";
const USER_NAME: &str = "aws";
const CONTEXT_NAME: &str = "aws";

/// Exec credential plugin API version
pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Kubeconfig structure
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// API version
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Clusters
    pub clusters: Vec<KubeconfigCluster>,
    /// Contexts
    pub contexts: Vec<KubeconfigContext>,
    /// Current context
    pub current_context: String,
    /// Kind (always "Config")
    pub kind: String,
    /// Preferences (always empty)
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    /// Users
    pub users: Vec<KubeconfigUser>,
}

/// Cluster entry in kubeconfig
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct KubeconfigCluster {
    /// Cluster config
    pub cluster: ClusterEndpoint,
    /// Cluster name
    pub name: String,
}

/// Cluster endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEndpoint {
    /// API server URL
    pub server: String,
    /// CA certificate (base64 encoded)
    pub certificate_authority_data: String,
}

/// Context entry in kubeconfig
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct KubeconfigContext {
    /// Context config
    pub context: ContextConfig,
    /// Context name
    pub name: String,
}

/// Context configuration
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ContextConfig {
    /// Cluster name (reference)
    pub cluster: String,
    /// User name (reference)
    pub user: String,
}

/// User entry in kubeconfig
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct KubeconfigUser {
    /// User name
    pub name: String,
    /// User config
    pub user: UserConfig,
}

/// User configuration
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserConfig {
    /// Exec credential plugin
    pub exec: ExecConfig,
}

/// Exec credential plugin configuration
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    /// API version
    pub api_version: String,
    /// Command to run
    pub command: String,
    /// Arguments
    pub args: Vec<String>,
    /// Environment overrides
    #[serde(default)]
    pub env: Vec<ExecEnvVar>,
}

/// Environment variable passed to the exec plugin
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecEnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

impl Kubeconfig {
    /// Kubeconfig for an EKS cluster authenticating with static credentials
    pub fn for_eks(
        endpoint: &str,
        certificate_authority_data: &str,
        cluster_name: &str,
        credentials: &AwsCredentials,
    ) -> Self {
        Self {
            api_version: "v1".to_string(),
            clusters: vec![KubeconfigCluster {
                cluster: ClusterEndpoint {
                    server: endpoint.to_string(),
                    certificate_authority_data: certificate_authority_data.to_string(),
                },
                name: CLUSTER_ENTRY_NAME.to_string(),
            }],
            contexts: vec![KubeconfigContext {
                context: ContextConfig {
                    cluster: CLUSTER_ENTRY_NAME.to_string(),
                    user: USER_NAME.to_string(),
                },
                name: CONTEXT_NAME.to_string(),
            }],
            current_context: CONTEXT_NAME.to_string(),
            kind: "Config".to_string(),
            preferences: BTreeMap::new(),
            users: vec![KubeconfigUser {
                name: USER_NAME.to_string(),
                user: UserConfig {
                    exec: ExecConfig {
                        api_version: EXEC_API_VERSION.to_string(),
                        command: "aws".to_string(),
                        args: vec![
                            "eks".to_string(),
                            "get-token".to_string(),
                            "--cluster-name".to_string(),
                            cluster_name.to_string(),
                        ],
                        env: vec![
                            ExecEnvVar {
                                name: ACCESS_KEY_ID_ENV.to_string(),
                                value: credentials.access_key_id.clone(),
                            },
                            ExecEnvVar {
                                name: SECRET_ACCESS_KEY_ENV.to_string(),
                                value: credentials.secret_access_key.clone(),
                            },
                        ],
                    },
                },
            }],
        }
    }

    /// Parse a kubeconfig previously produced by [`Kubeconfig::to_yaml`]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::serialization(format!("failed to parse kubeconfig: {}", e)))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::serialization(format!("failed to serialize kubeconfig: {}", e)))
    }

    /// Value of an exec environment override on the current context's user
    pub fn exec_env(&self, name: &str) -> Option<&str> {
        let user_name = self
            .contexts
            .iter()
            .find(|c| c.name == self.current_context)
            .map(|c| c.context.user.as_str())?;

        self.users
            .iter()
            .find(|u| u.name == user_name)?
            .user
            .exec
            .env
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Credentials embedded in the exec plugin environment
    pub fn credentials(&self) -> Option<AwsCredentials> {
        Some(AwsCredentials::new(
            self.exec_env(ACCESS_KEY_ID_ENV)?,
            self.exec_env(SECRET_ACCESS_KEY_ENV)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Kubeconfig {
        Kubeconfig::for_eks(
            "https://ABC.gr7.us-west-2.eks.amazonaws.com",
            "LS0tLS1CRUdJTg==",
            "aws-us-west-2-c1",
            &AwsCredentials::new("AK", "SK"),
        )
    }

    #[test]
    fn yaml_has_expected_shape() {
        let yaml = sample().to_yaml().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Config");
        assert_eq!(value["current-context"], "aws");
        assert_eq!(value["clusters"][0]["name"], "kubernetes");
        assert_eq!(
            value["clusters"][0]["cluster"]["server"],
            "https://ABC.gr7.us-west-2.eks.amazonaws.com"
        );
        assert_eq!(
            value["clusters"][0]["cluster"]["certificate-authority-data"],
            "LS0tLS1CRUdJTg=="
        );
        assert_eq!(value["contexts"][0]["context"]["cluster"], "kubernetes");
        assert_eq!(value["contexts"][0]["context"]["user"], "aws");

        let exec = &value["users"][0]["user"]["exec"];
        assert_eq!(exec["command"], "aws");
        assert_eq!(exec["apiVersion"], EXEC_API_VERSION);
        assert_eq!(exec["args"][3], "aws-us-west-2-c1");
        assert_eq!(exec["env"][0]["name"], "AWS_ACCESS_KEY_ID");
        assert_eq!(exec["env"][0]["value"], "AK");
        assert_eq!(exec["env"][1]["name"], "AWS_SECRET_ACCESS_KEY");
        assert_eq!(exec["env"][1]["value"], "SK");
    }

    #[test]
    fn credentials_roundtrip_through_yaml() {
        let yaml = sample().to_yaml().unwrap();
        let parsed = Kubeconfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(parsed.credentials(), Some(AwsCredentials::new("AK", "SK")));
    }

    #[test]
    fn missing_env_yields_no_credentials() {
        let mut config = sample();
        config.users[0].user.exec.env.pop();
        assert!(config.credentials().is_none());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            Kubeconfig::from_yaml("not: [a, kubeconfig"),
            Err(Error::Serialization(_))
        ));
    }
}
