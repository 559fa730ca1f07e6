//! Cluster provider abstraction layer
//!
//! This module provides a trait-based abstraction for the clouds a grid can
//! place clusters on. Each provider implements the [`ClusterProvider`] trait
//! to bring a cluster to a usable state and to tear down clusters it created.
//!
//! # Supported Providers
//!
//! - [`EksProvider`] - Amazon EKS, for existing and newly created clusters
//!
//! # Example
//!
//! ```text
//! let providers = Providers::new(Arc::new(EksProvider::new(timeouts)));
//! let provider = providers.for_kind(spec.provider());
//! let cluster = provider.provision("my-grid", &spec).await?;
//! ```

pub mod eks;

pub use eks::EksProvider;

use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::types::{ClusterConfig, ClusterSpec, ProviderKind};
use crate::Result;

/// Cluster provider trait
///
/// Implementations drive one cluster spec to a ready cluster and describe how
/// to reach it. They never touch the registry; the caller records the
/// returned [`ClusterConfig`].
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use kubectl_grid::provider::ClusterProvider;
/// use kubectl_grid::types::{ClusterConfig, ClusterSpec};
/// use kubectl_grid::Result;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl ClusterProvider for MyProvider {
///     async fn provision(&self, grid_name: &str, spec: &ClusterSpec) -> Result<ClusterConfig> {
///         // Connect to or create the cluster
///         todo!()
///     }
///
///     async fn teardown(&self, cluster: &ClusterConfig) -> Result<()> {
///         // Delete a cluster this provider created
///         todo!()
///     }
/// }
/// ```
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Bring the cluster described by `spec` to a usable state
    ///
    /// For existing clusters this only fetches connection details. For new
    /// clusters it creates every missing dependency, waits for the control
    /// plane and requests worker capacity.
    ///
    /// # Arguments
    ///
    /// * `grid_name` - Grid the cluster belongs to; names new clusters that
    ///   carry no identifier of their own
    /// * `spec` - The desired cluster
    ///
    /// # Returns
    ///
    /// The registry record for the cluster, including its kubeconfig
    async fn provision(&self, grid_name: &str, spec: &ClusterSpec) -> Result<ClusterConfig>;

    /// Delete a cluster this provider created
    ///
    /// A cluster that is already gone counts as deleted. Clusters recorded as
    /// existing are refused.
    async fn teardown(&self, cluster: &ClusterConfig) -> Result<()>;
}

/// Providers by kind
///
/// Dispatch is an exhaustive match on [`ProviderKind`], so adding a kind
/// fails to compile until it has a provider here.
#[derive(Clone)]
pub struct Providers {
    aws: Arc<dyn ClusterProvider>,
}

impl Providers {
    /// Create the registry from one provider per kind
    pub fn new(aws: Arc<dyn ClusterProvider>) -> Self {
        Self { aws }
    }

    /// Provider for `kind`
    pub fn for_kind(&self, kind: ProviderKind) -> Arc<dyn ClusterProvider> {
        match kind {
            ProviderKind::Aws => self.aws.clone(),
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}
