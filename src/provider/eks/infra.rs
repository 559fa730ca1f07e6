//! Idempotent EKS infrastructure
//!
//! Every `ensure_*` function first looks for a resource carrying the grid
//! ownership marker and reuses the first match; it only creates when nothing
//! matches. Subnets are matched per availability zone block. Re-running any of them after a partial failure converges on the
//! same resources.
//!
//! Concurrent runs in separate processes can race between the lookup and the
//! create. EKS creates carry a client request token so a retried create of the
//! same cluster or node group is absorbed by AWS; EC2 and IAM creates are not
//! guarded.

use std::time::Duration;

use tracing::{debug, info};

use super::client::{
    AwsApi, CreateClusterRequest, CreateNodeGroupRequest, EksCluster, IamRole, ResourceStatus,
    ResourceTag,
};
use crate::poll::wait_with_timeout;
use crate::{Error, Result};

/// Tag key marking resources owned by the grid tool
pub const OWNERSHIP_TAG_KEY: &str = "replicatedhq/mopgrid";
/// Tag value marking resources owned by the grid tool
pub const OWNERSHIP_TAG_VALUE: &str = "1";

/// Network block for the grid VPC
pub const VPC_CIDR: &str = "172.24.0.0/16";

/// Subnet blocks and the availability zone suffix each is placed in
pub const SUBNETS: [(&str, &str); 2] = [("172.24.100.0/24", "a"), ("172.24.101.0/24", "b")];

/// Name of the grid security group
pub const SECURITY_GROUP_NAME: &str = "replicatedhq-mopgrid-default";
const SECURITY_GROUP_DESCRIPTION: &str = "default security group for kubectl-grid clusters";

/// IAM path the grid role lives under
pub const ROLE_PATH: &str = "/replicatedhq/";
/// Name of the grid role
pub const ROLE_NAME: &str = "mopgrid";

/// Managed policies attached to the grid role. The same role runs both the
/// control plane and the nodes.
pub const ROLE_POLICIES: [&str; 5] = [
    "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy",
    "arn:aws:iam::aws:policy/AmazonEKSServicePolicy",
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// Network and identity a cluster is placed into
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwsVpc {
    /// VPC id
    pub id: String,
    /// Security groups for control plane ENIs
    pub security_group_ids: Vec<String>,
    /// Subnets for the control plane and nodes
    pub subnet_ids: Vec<String>,
    /// Role used by the control plane and nodes
    pub role_arn: String,
}

fn ownership_tag() -> ResourceTag {
    ResourceTag {
        key: OWNERSHIP_TAG_KEY.to_string(),
        value: OWNERSHIP_TAG_VALUE.to_string(),
    }
}

/// Trust policy letting EKS and EC2 assume the grid role
pub fn assume_role_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {
                "Service": ["eks.amazonaws.com", "ec2.amazonaws.com"]
            },
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

/// Reuse the first tagged VPC or create one
pub async fn ensure_vpc(api: &dyn AwsApi) -> Result<String> {
    if let Some(id) = api.find_tagged_vpcs(OWNERSHIP_TAG_KEY).await?.into_iter().next() {
        debug!(vpc = %id, "Reusing VPC");
        return Ok(id);
    }

    let id = api.create_vpc(VPC_CIDR, &ownership_tag()).await?;
    info!(vpc = %id, "Created VPC");
    Ok(id)
}

/// Reuse the first tagged security group in `vpc_id` or create one
pub async fn ensure_security_group(api: &dyn AwsApi, vpc_id: &str) -> Result<String> {
    if let Some(id) = api
        .find_tagged_security_groups(vpc_id, OWNERSHIP_TAG_KEY)
        .await?
        .into_iter()
        .next()
    {
        debug!(security_group = %id, "Reusing security group");
        return Ok(id);
    }

    let id = api
        .create_security_group(
            vpc_id,
            SECURITY_GROUP_NAME,
            SECURITY_GROUP_DESCRIPTION,
            &ownership_tag(),
        )
        .await?;
    info!(security_group = %id, "Created security group");
    Ok(id)
}

/// One subnet per availability zone, reusing tagged subnets that already
/// cover a zone's block and creating the rest
pub async fn ensure_subnets(api: &dyn AwsApi, vpc_id: &str, region: &str) -> Result<Vec<String>> {
    let existing = api.find_tagged_subnets(vpc_id, OWNERSHIP_TAG_KEY).await?;

    let tag = ownership_tag();
    let mut ids = Vec::with_capacity(SUBNETS.len());
    for (cidr, zone_suffix) in SUBNETS {
        if let Some(subnet) = existing.iter().find(|s| s.cidr_block == cidr) {
            debug!(subnet = %subnet.id, cidr = %cidr, "Reusing subnet");
            ids.push(subnet.id.clone());
            continue;
        }

        let zone = format!("{}{}", region, zone_suffix);
        let id = api.create_subnet(vpc_id, cidr, &zone, &tag).await?;
        info!(subnet = %id, zone = %zone, "Created subnet");
        ids.push(id);
    }
    Ok(ids)
}

/// Reuse the first role under the grid path or create one, then make sure
/// the managed policies are attached
pub async fn ensure_role(api: &dyn AwsApi) -> Result<String> {
    let role = match api.find_roles(ROLE_PATH).await?.into_iter().next() {
        Some(role) => {
            debug!(role = %role.arn, "Reusing role");
            role
        }
        None => {
            let role = api
                .create_role(ROLE_NAME, ROLE_PATH, &assume_role_policy())
                .await?;
            info!(role = %role.arn, "Created role");
            role
        }
    };

    attach_policies(api, &role).await?;
    Ok(role.arn)
}

async fn attach_policies(api: &dyn AwsApi, role: &IamRole) -> Result<()> {
    for policy in ROLE_POLICIES {
        api.attach_role_policy(&role.name, policy).await?;
    }
    Ok(())
}

/// Network, security group, subnets and role, in dependency order
pub async fn ensure_network(api: &dyn AwsApi, region: &str) -> Result<AwsVpc> {
    let id = ensure_vpc(api).await?;
    let security_group = ensure_security_group(api, &id).await?;
    let subnet_ids = ensure_subnets(api, &id, region).await?;
    let role_arn = ensure_role(api).await?;

    Ok(AwsVpc {
        id,
        security_group_ids: vec![security_group],
        subnet_ids,
        role_arn,
    })
}

/// Request a control plane named `name` unless one already exists
pub async fn ensure_control_plane(
    api: &dyn AwsApi,
    name: &str,
    version: Option<&str>,
    vpc: &AwsVpc,
) -> Result<()> {
    if let Some(cluster) = api.describe_cluster(name).await? {
        debug!(cluster = %name, status = ?cluster.status, "Control plane already requested");
        return Ok(());
    }

    api.create_cluster(&CreateClusterRequest {
        name: name.to_string(),
        version: version.map(str::to_string),
        role_arn: vpc.role_arn.clone(),
        subnet_ids: vpc.subnet_ids.clone(),
        security_group_ids: vpc.security_group_ids.clone(),
        client_request_token: name.to_string(),
    })
    .await?;
    info!(cluster = %name, "Requested control plane");
    Ok(())
}

/// Wait until the control plane is active with its endpoint published
pub async fn wait_for_cluster_active(
    api: &dyn AwsApi,
    name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<EksCluster> {
    let description = format!("eks cluster {}", name);
    wait_with_timeout(timeout, interval, &description, move || async move {
        let cluster = api
            .describe_cluster(name)
            .await?
            .ok_or_else(|| Error::provider(format!("eks cluster {} disappeared", name)))?;

        match &cluster.status {
            ResourceStatus::Active
                if cluster.endpoint.is_some() && cluster.certificate_authority_data.is_some() =>
            {
                Ok(Some(cluster))
            }
            ResourceStatus::Failed(status) => Err(Error::provider(format!(
                "eks cluster {} entered {} state",
                name, status
            ))),
            _ => Ok(None),
        }
    })
    .await
}

/// Request a node group unless one already exists
pub async fn ensure_node_group(
    api: &dyn AwsApi,
    cluster_name: &str,
    node_group_name: &str,
    vpc: &AwsVpc,
) -> Result<()> {
    if let Some(status) = api.describe_node_group(cluster_name, node_group_name).await? {
        debug!(cluster = %cluster_name, node_group = %node_group_name, status = ?status, "Node group already requested");
        return Ok(());
    }

    api.create_node_group(&CreateNodeGroupRequest {
        cluster_name: cluster_name.to_string(),
        node_group_name: node_group_name.to_string(),
        node_role_arn: vpc.role_arn.clone(),
        subnet_ids: vpc.subnet_ids.clone(),
        client_request_token: node_group_name.to_string(),
    })
    .await?;
    info!(cluster = %cluster_name, node_group = %node_group_name, "Requested node group");
    Ok(())
}

/// Wait until a node group is active
pub async fn wait_for_node_group_active(
    api: &dyn AwsApi,
    cluster_name: &str,
    node_group_name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let description = format!("node group {}", node_group_name);
    wait_with_timeout(timeout, interval, &description, move || async move {
        match api.describe_node_group(cluster_name, node_group_name).await? {
            Some(ResourceStatus::Active) => Ok(Some(())),
            Some(ResourceStatus::Failed(status)) => Err(Error::provider(format!(
                "node group {} entered {} state",
                node_group_name, status
            ))),
            Some(_) => Ok(None),
            None => Err(Error::provider(format!(
                "node group {} does not exist",
                node_group_name
            ))),
        }
    })
    .await
}

/// Delete a node group and wait until it is gone. A missing node group is
/// already deleted.
pub async fn delete_node_group(
    api: &dyn AwsApi,
    cluster_name: &str,
    node_group_name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    match api.describe_node_group(cluster_name, node_group_name).await? {
        None => {
            debug!(node_group = %node_group_name, "Node group already deleted");
            return Ok(());
        }
        Some(ResourceStatus::Deleting) => {}
        Some(_) => api.delete_node_group(cluster_name, node_group_name).await?,
    }

    info!(cluster = %cluster_name, node_group = %node_group_name, "Waiting for node group deletion");
    let description = format!("deletion of node group {}", node_group_name);
    wait_with_timeout(timeout, interval, &description, move || async move {
        match api.describe_node_group(cluster_name, node_group_name).await? {
            None => Ok(Some(())),
            Some(ResourceStatus::Failed(status)) => Err(Error::provider(format!(
                "node group {} entered {} state",
                node_group_name, status
            ))),
            Some(_) => Ok(None),
        }
    })
    .await
}

/// Issue a control plane delete. A missing cluster is already deleted.
pub async fn delete_control_plane(api: &dyn AwsApi, name: &str) -> Result<()> {
    match api.describe_cluster(name).await? {
        None => {
            debug!(cluster = %name, "Control plane already deleted");
            Ok(())
        }
        Some(cluster) if cluster.status == ResourceStatus::Deleting => Ok(()),
        Some(_) => {
            api.delete_cluster(name).await?;
            info!(cluster = %name, "Requested control plane deletion");
            Ok(())
        }
    }
}
