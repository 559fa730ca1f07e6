//! AWS API client for EKS provisioning
//!
//! Provides a trait-based abstraction over the EC2, IAM and EKS calls the
//! provisioner makes, allowing tests to mock AWS while production code uses
//! the AWS SDK.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, ResourceType, Tag, TagSpecification};
use aws_sdk_eks::types::VpcConfigRequest;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::credentials::AwsCredentials;
use crate::{Error, Result};

/// Credential provider name reported to the SDK
const CREDENTIALS_PROVIDER_NAME: &str = "kubectl-grid";

/// A tag applied to created cloud resources
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceTag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

/// An IAM role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IamRole {
    /// Role name
    pub name: String,
    /// Role ARN
    pub arn: String,
}

/// A subnet and the address block it covers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subnet {
    /// Subnet ID
    pub id: String,
    /// IPv4 CIDR block
    pub cidr_block: String,
}

/// Lifecycle status of an EKS cluster or node group
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Being created
    Creating,
    /// Ready for use
    Active,
    /// Being updated
    Updating,
    /// Being deleted
    Deleting,
    /// Terminal failure (FAILED, CREATE_FAILED, DELETE_FAILED)
    Failed(String),
    /// Any other status
    Other(String),
}

impl ResourceStatus {
    /// Map an EKS status string
    pub fn from_api(status: &str) -> Self {
        match status {
            "CREATING" | "PENDING" => ResourceStatus::Creating,
            "ACTIVE" => ResourceStatus::Active,
            "UPDATING" => ResourceStatus::Updating,
            "DELETING" => ResourceStatus::Deleting,
            "FAILED" | "CREATE_FAILED" | "DELETE_FAILED" => {
                ResourceStatus::Failed(status.to_string())
            }
            other => ResourceStatus::Other(other.to_string()),
        }
    }
}

/// An EKS cluster as described by the API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EksCluster {
    /// Cluster name
    pub name: String,
    /// Lifecycle status
    pub status: ResourceStatus,
    /// API server endpoint, once published
    pub endpoint: Option<String>,
    /// Base64 CA data, once published
    pub certificate_authority_data: Option<String>,
}

/// Parameters for creating an EKS control plane
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateClusterRequest {
    /// Cluster name
    pub name: String,
    /// Kubernetes version; EKS picks its default when unset
    pub version: Option<String>,
    /// Execution role ARN
    pub role_arn: String,
    /// Subnets for the control plane ENIs
    pub subnet_ids: Vec<String>,
    /// Security groups for the control plane ENIs
    pub security_group_ids: Vec<String>,
    /// Idempotency token
    pub client_request_token: String,
}

/// Parameters for creating an EKS managed node group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateNodeGroupRequest {
    /// Owning cluster
    pub cluster_name: String,
    /// Node group name
    pub node_group_name: String,
    /// Node role ARN
    pub node_role_arn: String,
    /// Subnets for the nodes
    pub subnet_ids: Vec<String>,
    /// Idempotency token
    pub client_request_token: String,
}

/// Trait abstracting the AWS calls made while provisioning
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AwsApi: Send + Sync {
    /// IDs of VPCs carrying `tag_key`
    async fn find_tagged_vpcs(&self, tag_key: &str) -> Result<Vec<String>>;

    /// Create a VPC, returning its ID
    async fn create_vpc(&self, cidr_block: &str, tag: &ResourceTag) -> Result<String>;

    /// IDs of security groups in `vpc_id` carrying `tag_key`
    async fn find_tagged_security_groups(&self, vpc_id: &str, tag_key: &str)
        -> Result<Vec<String>>;

    /// Create a security group, returning its ID
    async fn create_security_group(
        &self,
        vpc_id: &str,
        group_name: &str,
        description: &str,
        tag: &ResourceTag,
    ) -> Result<String>;

    /// Subnets in `vpc_id` carrying `tag_key`
    async fn find_tagged_subnets(&self, vpc_id: &str, tag_key: &str) -> Result<Vec<Subnet>>;

    /// Create a subnet, returning its ID
    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr_block: &str,
        availability_zone: &str,
        tag: &ResourceTag,
    ) -> Result<String>;

    /// IAM roles under `path_prefix`
    async fn find_roles(&self, path_prefix: &str) -> Result<Vec<IamRole>>;

    /// Create an IAM role
    async fn create_role(
        &self,
        role_name: &str,
        path: &str,
        assume_role_policy: &str,
    ) -> Result<IamRole>;

    /// Attach a managed policy to a role. Attaching twice is not an error.
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    /// Describe a cluster, `None` if it does not exist
    async fn describe_cluster(&self, name: &str) -> Result<Option<EksCluster>>;

    /// Create a cluster control plane
    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<()>;

    /// Delete a cluster control plane. A missing cluster is not an error.
    async fn delete_cluster(&self, name: &str) -> Result<()>;

    /// Status of a node group, `None` if it does not exist
    async fn describe_node_group(
        &self,
        cluster_name: &str,
        node_group_name: &str,
    ) -> Result<Option<ResourceStatus>>;

    /// Create a managed node group
    async fn create_node_group(&self, request: &CreateNodeGroupRequest) -> Result<()>;

    /// Delete a managed node group. A missing node group is not an error.
    async fn delete_node_group(&self, cluster_name: &str, node_group_name: &str) -> Result<()>;
}

/// Builds [`AwsApi`] clients scoped to a region and static credentials
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AwsClientFactory: Send + Sync {
    /// Client for `region` authenticating with `credentials`
    async fn client(&self, region: &str, credentials: &AwsCredentials) -> Result<Arc<dyn AwsApi>>;
}

/// Factory producing AWS SDK clients
#[derive(Clone, Debug, Default)]
pub struct SdkClientFactory;

#[async_trait]
impl AwsClientFactory for SdkClientFactory {
    async fn client(&self, region: &str, credentials: &AwsCredentials) -> Result<Arc<dyn AwsApi>> {
        Ok(Arc::new(SdkAwsClient::new(region, credentials).await))
    }
}

/// [`AwsApi`] backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct SdkAwsClient {
    ec2: aws_sdk_ec2::Client,
    iam: aws_sdk_iam::Client,
    eks: aws_sdk_eks::Client,
}

impl SdkAwsClient {
    /// Create clients for `region` using only the given static credentials
    pub async fn new(region: &str, credentials: &AwsCredentials) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            ))
            .load()
            .await;

        debug!(region = %region, "Loaded AWS SDK config");

        Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            eks: aws_sdk_eks::Client::new(&config),
        }
    }
}

fn tag_key_filter(tag_key: &str) -> Filter {
    Filter::builder().name("tag-key").values(tag_key).build()
}

fn vpc_filter(vpc_id: &str) -> Filter {
    Filter::builder().name("vpc-id").values(vpc_id).build()
}

fn tag_specification(resource_type: ResourceType, tag: &ResourceTag) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .tags(Tag::builder().key(&tag.key).value(&tag.value).build())
        .build()
}

fn sdk_err<E>(what: &str, err: E) -> Error
where
    E: std::error::Error,
{
    Error::provider(format!("failed to {}: {}", what, DisplayErrorContext(&err)))
}

#[async_trait]
impl AwsApi for SdkAwsClient {
    async fn find_tagged_vpcs(&self, tag_key: &str) -> Result<Vec<String>> {
        let out = self
            .ec2
            .describe_vpcs()
            .filters(tag_key_filter(tag_key))
            .send()
            .await
            .map_err(|e| sdk_err("describe VPCs", e))?;

        Ok(out
            .vpcs()
            .iter()
            .filter_map(|v| v.vpc_id().map(str::to_string))
            .collect())
    }

    async fn create_vpc(&self, cidr_block: &str, tag: &ResourceTag) -> Result<String> {
        let out = self
            .ec2
            .create_vpc()
            .cidr_block(cidr_block)
            .tag_specifications(tag_specification(ResourceType::Vpc, tag))
            .send()
            .await
            .map_err(|e| sdk_err("create VPC", e))?;

        out.vpc()
            .and_then(|v| v.vpc_id())
            .map(str::to_string)
            .ok_or_else(|| Error::provider("create VPC returned no VPC id"))
    }

    async fn find_tagged_security_groups(
        &self,
        vpc_id: &str,
        tag_key: &str,
    ) -> Result<Vec<String>> {
        let out = self
            .ec2
            .describe_security_groups()
            .filters(tag_key_filter(tag_key))
            .filters(vpc_filter(vpc_id))
            .send()
            .await
            .map_err(|e| sdk_err("describe security groups", e))?;

        Ok(out
            .security_groups()
            .iter()
            .filter_map(|g| g.group_id().map(str::to_string))
            .collect())
    }

    async fn create_security_group(
        &self,
        vpc_id: &str,
        group_name: &str,
        description: &str,
        tag: &ResourceTag,
    ) -> Result<String> {
        let out = self
            .ec2
            .create_security_group()
            .description(description)
            .group_name(group_name)
            .vpc_id(vpc_id)
            .tag_specifications(tag_specification(ResourceType::SecurityGroup, tag))
            .send()
            .await
            .map_err(|e| sdk_err("create security group", e))?;

        out.group_id()
            .map(str::to_string)
            .ok_or_else(|| Error::provider("create security group returned no group id"))
    }

    async fn find_tagged_subnets(&self, vpc_id: &str, tag_key: &str) -> Result<Vec<Subnet>> {
        let out = self
            .ec2
            .describe_subnets()
            .filters(tag_key_filter(tag_key))
            .filters(vpc_filter(vpc_id))
            .send()
            .await
            .map_err(|e| sdk_err("describe subnets", e))?;

        Ok(out
            .subnets()
            .iter()
            .filter_map(|s| {
                Some(Subnet {
                    id: s.subnet_id()?.to_string(),
                    cidr_block: s.cidr_block()?.to_string(),
                })
            })
            .collect())
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr_block: &str,
        availability_zone: &str,
        tag: &ResourceTag,
    ) -> Result<String> {
        let out = self
            .ec2
            .create_subnet()
            .vpc_id(vpc_id)
            .cidr_block(cidr_block)
            .availability_zone(availability_zone)
            .tag_specifications(tag_specification(ResourceType::Subnet, tag))
            .send()
            .await
            .map_err(|e| sdk_err("create subnet", e))?;

        out.subnet()
            .and_then(|s| s.subnet_id())
            .map(str::to_string)
            .ok_or_else(|| Error::provider("create subnet returned no subnet id"))
    }

    async fn find_roles(&self, path_prefix: &str) -> Result<Vec<IamRole>> {
        let out = self
            .iam
            .list_roles()
            .path_prefix(path_prefix)
            .send()
            .await
            .map_err(|e| sdk_err("list roles", e))?;

        Ok(out
            .roles()
            .iter()
            .map(|r| IamRole {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            })
            .collect())
    }

    async fn create_role(
        &self,
        role_name: &str,
        path: &str,
        assume_role_policy: &str,
    ) -> Result<IamRole> {
        let out = self
            .iam
            .create_role()
            .role_name(role_name)
            .path(path)
            .assume_role_policy_document(assume_role_policy)
            .send()
            .await
            .map_err(|e| sdk_err("create role", e))?;

        out.role()
            .map(|r| IamRole {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            })
            .ok_or_else(|| Error::provider("create role returned no role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_err("attach policy", e))?;
        Ok(())
    }

    async fn describe_cluster(&self, name: &str) -> Result<Option<EksCluster>> {
        let out = match self.eks.describe_cluster().name(name).send().await {
            Ok(out) => out,
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(sdk_err("describe cluster", e)),
        };

        Ok(out.cluster().map(|c| EksCluster {
            name: c.name().unwrap_or(name).to_string(),
            status: c
                .status()
                .map(|s| ResourceStatus::from_api(s.as_str()))
                .unwrap_or_else(|| ResourceStatus::Other("UNKNOWN".to_string())),
            endpoint: c.endpoint().map(str::to_string),
            certificate_authority_data: c
                .certificate_authority()
                .and_then(|ca| ca.data())
                .map(str::to_string),
        }))
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<()> {
        let vpc_config = VpcConfigRequest::builder()
            .set_subnet_ids(Some(request.subnet_ids.clone()))
            .set_security_group_ids(Some(request.security_group_ids.clone()))
            .build();

        self.eks
            .create_cluster()
            .name(&request.name)
            .set_version(request.version.clone())
            .role_arn(&request.role_arn)
            .resources_vpc_config(vpc_config)
            .client_request_token(&request.client_request_token)
            .send()
            .await
            .map_err(|e| sdk_err("create eks cluster", e))?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        match self.eks.delete_cluster().name(name).send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(())
            }
            Err(e) => Err(sdk_err("delete eks cluster", e)),
        }
    }

    async fn describe_node_group(
        &self,
        cluster_name: &str,
        node_group_name: &str,
    ) -> Result<Option<ResourceStatus>> {
        let out = match self
            .eks
            .describe_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(node_group_name)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(sdk_err("describe cluster nodegroup", e)),
        };

        Ok(out.nodegroup().map(|ng| {
            ng.status()
                .map(|s| ResourceStatus::from_api(s.as_str()))
                .unwrap_or_else(|| ResourceStatus::Other("UNKNOWN".to_string()))
        }))
    }

    async fn create_node_group(&self, request: &CreateNodeGroupRequest) -> Result<()> {
        self.eks
            .create_nodegroup()
            .cluster_name(&request.cluster_name)
            .nodegroup_name(&request.node_group_name)
            .node_role(&request.node_role_arn)
            .set_subnets(Some(request.subnet_ids.clone()))
            .client_request_token(&request.client_request_token)
            .send()
            .await
            .map_err(|e| sdk_err("create eks node group", e))?;
        Ok(())
    }

    async fn delete_node_group(&self, cluster_name: &str, node_group_name: &str) -> Result<()> {
        match self
            .eks
            .delete_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(node_group_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(())
            }
            Err(e) => Err(sdk_err("delete eks node group", e)),
        }
    }
}
