//! Amazon EKS provider
//!
//! Existing clusters are only described so a kubeconfig can be built. New
//! clusters go through the full pipeline: network, security group, subnets,
//! role, control plane, readiness wait and node group. The node group shares
//! the cluster's deterministic name.

pub mod client;
pub mod credentials;
pub mod infra;
pub mod kubeconfig;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use self::client::{AwsApi, AwsClientFactory, EksCluster, SdkClientFactory};
use self::credentials::AwsCredentials;
use self::infra::AwsVpc;
use self::kubeconfig::Kubeconfig;
use crate::config::ProvisionTimeouts;
use crate::provider::ClusterProvider;
use crate::types::{
    deterministic_cluster_name, ClusterConfig, ClusterSpec, CredentialRefs,
    EksExistingClusterSpec, EksNewClusterSpec, EksSpec, ProviderKind,
};
use crate::{Error, Result};

/// EKS cluster provider
pub struct EksProvider {
    factory: Arc<dyn AwsClientFactory>,
    timeouts: ProvisionTimeouts,
}

impl EksProvider {
    /// Provider talking to AWS through the SDK
    pub fn new(timeouts: ProvisionTimeouts) -> Self {
        Self::with_factory(Arc::new(SdkClientFactory), timeouts)
    }

    /// Provider using `factory` for AWS clients
    pub fn with_factory(factory: Arc<dyn AwsClientFactory>, timeouts: ProvisionTimeouts) -> Self {
        Self { factory, timeouts }
    }

    async fn connect_existing(&self, spec: &EksExistingClusterSpec) -> Result<ClusterConfig> {
        let credentials = AwsCredentials::resolve(&spec.access_key_id, &spec.secret_access_key)?;
        let api = self.factory.client(&spec.region, &credentials).await?;

        let cluster = api.describe_cluster(&spec.cluster_name).await?.ok_or_else(|| {
            Error::provider(format!(
                "eks cluster {} not found in {}",
                spec.cluster_name, spec.region
            ))
        })?;
        let kubeconfig = render_kubeconfig(&cluster, &spec.cluster_name, &credentials)?;

        info!(cluster = %spec.cluster_name, region = %spec.region, "Connected to existing EKS cluster");

        Ok(ClusterConfig {
            name: deterministic_cluster_name(ProviderKind::Aws, &spec.region, &spec.cluster_name),
            provider: ProviderKind::Aws,
            is_existing: true,
            region: spec.region.clone(),
            identifier: spec.cluster_name.clone(),
            kubeconfig: Some(kubeconfig),
            credentials: None,
        })
    }

    async fn create_new(&self, grid_name: &str, spec: &EksNewClusterSpec) -> Result<ClusterConfig> {
        let identifier = spec.name.as_deref().unwrap_or(grid_name);
        let cluster_name = deterministic_cluster_name(ProviderKind::Aws, &spec.region, identifier);

        let credentials = AwsCredentials::resolve(&spec.access_key_id, &spec.secret_access_key)?;
        let api = self.factory.client(&spec.region, &credentials).await?;

        info!(cluster = %cluster_name, "Ensuring network for EKS cluster");
        let vpc = infra::ensure_network(api.as_ref(), &spec.region).await?;

        info!(cluster = %cluster_name, vpc = %vpc.id, "Ensuring EKS control plane");
        infra::ensure_control_plane(api.as_ref(), &cluster_name, spec.version.as_deref(), &vpc)
            .await?;

        // From here on the control plane exists, so failures carry the record
        // needed to delete it.
        let record = ClusterConfig {
            name: cluster_name.clone(),
            provider: ProviderKind::Aws,
            is_existing: false,
            region: spec.region.clone(),
            identifier: identifier.to_string(),
            kubeconfig: None,
            credentials: Some(CredentialRefs {
                access_key_id: spec.access_key_id.clone(),
                secret_access_key: spec.secret_access_key.clone(),
            }),
        };

        match self
            .finish_new(api.as_ref(), &cluster_name, &vpc, &credentials)
            .await
        {
            Ok(kubeconfig) => Ok(ClusterConfig {
                kubeconfig: Some(kubeconfig),
                ..record
            }),
            Err(e) => Err(Error::incomplete(record, e)),
        }
    }

    async fn finish_new(
        &self,
        api: &dyn AwsApi,
        cluster_name: &str,
        vpc: &AwsVpc,
        credentials: &AwsCredentials,
    ) -> Result<String> {
        info!(
            cluster = %cluster_name,
            "Waiting for EKS control plane to become active (15 minutes is not unusual)"
        );
        let cluster = infra::wait_for_cluster_active(
            api,
            cluster_name,
            self.timeouts.control_plane,
            self.timeouts.poll_interval,
        )
        .await?;

        info!(cluster = %cluster_name, "Ensuring EKS node group");
        infra::ensure_node_group(api, cluster_name, cluster_name, vpc).await?;

        render_kubeconfig(&cluster, cluster_name, credentials)
    }
}

fn render_kubeconfig(
    cluster: &EksCluster,
    cluster_name: &str,
    credentials: &AwsCredentials,
) -> Result<String> {
    let endpoint = cluster.endpoint.as_deref().ok_or_else(|| {
        Error::provider(format!("eks cluster {} has no endpoint yet", cluster_name))
    })?;
    let ca = cluster.certificate_authority_data.as_deref().ok_or_else(|| {
        Error::provider(format!(
            "eks cluster {} has no certificate authority yet",
            cluster_name
        ))
    })?;

    Kubeconfig::for_eks(endpoint, ca, cluster_name, credentials).to_yaml()
}

// The kubeconfig holds the values resolved at create time; clusters recorded
// before their endpoint was published only carry the manifest references.
fn teardown_credentials(cluster: &ClusterConfig) -> Result<Option<AwsCredentials>> {
    if let Some(kubeconfig) = cluster.kubeconfig.as_deref() {
        if let Some(credentials) = Kubeconfig::from_yaml(kubeconfig)?.credentials() {
            return Ok(Some(credentials));
        }
    }

    cluster
        .credentials
        .as_ref()
        .map(|refs| AwsCredentials::resolve(&refs.access_key_id, &refs.secret_access_key))
        .transpose()
}

#[async_trait]
impl ClusterProvider for EksProvider {
    async fn provision(&self, grid_name: &str, spec: &ClusterSpec) -> Result<ClusterConfig> {
        match spec {
            ClusterSpec::Eks(EksSpec::Existing(existing)) => self.connect_existing(existing).await,
            ClusterSpec::Eks(EksSpec::New(new)) => self.create_new(grid_name, new).await,
        }
    }

    async fn teardown(&self, cluster: &ClusterConfig) -> Result<()> {
        if cluster.is_existing {
            return Err(Error::validation(format!(
                "refusing to delete existing cluster {}",
                cluster.name
            )));
        }

        let name = cluster.deterministic_name();
        let credentials = teardown_credentials(cluster)?.ok_or_else(|| {
            Error::provider(format!("no credentials recorded for cluster {}", name))
        })?;
        let api = self.factory.client(&cluster.region, &credentials).await?;

        info!(cluster = %name, "Deleting EKS node group");
        infra::delete_node_group(
            api.as_ref(),
            &name,
            &name,
            self.timeouts.node_group_delete,
            self.timeouts.poll_interval,
        )
        .await?;

        info!(cluster = %name, "Deleting EKS control plane");
        infra::delete_control_plane(api.as_ref(), &name).await
    }
}
