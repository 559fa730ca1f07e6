//! Shared fixtures for grid integration tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use kubectl_grid::grid::GridOrchestrator;
use kubectl_grid::provider::{ClusterProvider, Providers};
use kubectl_grid::secret::SecretRef;
use kubectl_grid::store::GridStore;
use kubectl_grid::types::{
    ClusterConfig, ClusterSpec, EksExistingClusterSpec, EksNewClusterSpec, EksSpec, ProviderKind,
};
use kubectl_grid::{Error, Result};

/// In-memory provider recording every call
#[derive(Default)]
pub struct FakeProvider {
    failing: HashSet<String>,
    stuck: HashSet<String>,
    delay: Duration,
    provisioned: Mutex<Vec<String>>,
    torn_down: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail provisioning for clusters with this identifier
    pub fn failing(mut self, identifier: &str) -> Self {
        self.failing.insert(identifier.to_string());
        self
    }

    /// Create clusters with this identifier but never let them become ready
    pub fn stuck(mut self, identifier: &str) -> Self {
        self.stuck.insert(identifier.to_string());
        self
    }

    /// Take this long to provision each cluster
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn provisioned(&self) -> Vec<String> {
        self.provisioned.lock().unwrap().clone()
    }

    pub fn torn_down(&self) -> Vec<String> {
        self.torn_down.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterProvider for FakeProvider {
    async fn provision(&self, grid_name: &str, spec: &ClusterSpec) -> Result<ClusterConfig> {
        tokio::time::sleep(self.delay).await;

        let name = spec.deterministic_name(grid_name);
        self.provisioned.lock().unwrap().push(name.clone());

        let identifier = spec.identifier(grid_name).to_string();
        if self.failing.contains(&identifier) {
            return Err(Error::not_ready(format!("eks cluster {}", name)));
        }

        let record = ClusterConfig {
            name: name.clone(),
            provider: ProviderKind::Aws,
            is_existing: spec.is_existing(),
            region: spec.region().to_string(),
            identifier: identifier.clone(),
            kubeconfig: None,
            credentials: None,
        };
        if self.stuck.contains(&identifier) {
            return Err(Error::incomplete(
                record,
                Error::not_ready(format!("eks cluster {}", name)),
            ));
        }

        Ok(ClusterConfig {
            kubeconfig: Some(format!("server: https://{}.example", name)),
            ..record
        })
    }

    async fn teardown(&self, cluster: &ClusterConfig) -> Result<()> {
        self.torn_down.lock().unwrap().push(cluster.name.clone());
        Ok(())
    }
}

/// Registry in a temporary directory plus an orchestrator over it
pub struct Harness {
    pub dir: TempDir,
    pub provider: Arc<FakeProvider>,
    pub orchestrator: GridOrchestrator,
}

impl Harness {
    pub fn new(provider: FakeProvider) -> Self {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(provider);
        let store = GridStore::new(dir.path().join("config.yaml"));
        let orchestrator = GridOrchestrator::new(store, Providers::new(provider.clone()));
        Self {
            dir,
            provider,
            orchestrator,
        }
    }

    pub fn store(&self) -> &GridStore {
        self.orchestrator.store()
    }
}

pub fn existing_cluster(region: &str, cluster_name: &str) -> ClusterSpec {
    ClusterSpec::Eks(EksSpec::Existing(EksExistingClusterSpec {
        region: region.to_string(),
        cluster_name: cluster_name.to_string(),
        access_key_id: SecretRef::literal("AK"),
        secret_access_key: SecretRef::literal("SK"),
    }))
}

pub fn new_cluster(region: &str, name: &str) -> ClusterSpec {
    ClusterSpec::Eks(EksSpec::New(EksNewClusterSpec {
        region: region.to_string(),
        version: None,
        name: Some(name.to_string()),
        access_key_id: SecretRef::literal("AK"),
        secret_access_key: SecretRef::literal("SK"),
    }))
}
