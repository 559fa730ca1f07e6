//! Grid orchestration
//!
//! Creating a grid registers it, then provisions every cluster concurrently
//! and waits until each one has reported. A failed cluster never stops its
//! siblings; the run ends with a [`CreateReport`] saying which clusters made
//! it. A cluster that was created but never became ready is still recorded so
//! a later delete removes it. Deleting a grid tears down only the clusters this
//! tool created, in registry order, and drops the grid from the registry once
//! all are gone.

pub mod completion;

use tracing::{error, info, instrument, warn};

use self::completion::{Completion, CompletionSet};
use crate::provider::{ClusterProvider, Providers};
use crate::store::GridStore;
use crate::types::{ClusterSpec, Grid, GridConfig};
use crate::{Error, Result};

/// Overall result of a grid-create run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateStatus {
    /// Every cluster is ready (trivially true for an empty grid)
    Succeeded,
    /// Some clusters are ready, some failed
    Partial,
    /// No cluster is ready
    Failed,
}

/// Outcome of one cluster in a grid-create run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterOutcome {
    /// Deterministic cluster name
    pub name: String,
    /// Failure description, `None` when the cluster is ready and recorded
    pub error: Option<String>,
}

impl ClusterOutcome {
    /// Whether the cluster is ready and recorded
    pub fn is_ready(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-cluster results of a grid-create run, in manifest order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateReport {
    /// Grid name
    pub grid: String,
    /// One outcome per manifest cluster
    pub clusters: Vec<ClusterOutcome>,
}

impl CreateReport {
    /// Overall status
    pub fn status(&self) -> CreateStatus {
        let ready = self.ready().count();
        if ready == self.clusters.len() {
            CreateStatus::Succeeded
        } else if ready == 0 {
            CreateStatus::Failed
        } else {
            CreateStatus::Partial
        }
    }

    /// Clusters that are ready
    pub fn ready(&self) -> impl Iterator<Item = &ClusterOutcome> {
        self.clusters.iter().filter(|c| c.is_ready())
    }

    /// Clusters that failed
    pub fn failures(&self) -> impl Iterator<Item = &ClusterOutcome> {
        self.clusters.iter().filter(|c| !c.is_ready())
    }
}

/// Drives grid create, delete and list against a registry
#[derive(Clone, Debug)]
pub struct GridOrchestrator {
    store: GridStore,
    providers: Providers,
}

impl GridOrchestrator {
    /// Create an orchestrator over `store` using `providers`
    pub fn new(store: GridStore, providers: Providers) -> Self {
        Self { store, providers }
    }

    /// The registry this orchestrator writes to
    pub fn store(&self) -> &GridStore {
        &self.store
    }

    /// Create a grid
    ///
    /// Fails before any cluster work when the grid is invalid or its name is
    /// already registered. Otherwise returns once every cluster task has
    /// reported, with per-cluster outcomes; cluster failures do not make this
    /// return an error.
    pub async fn create(&self, grid: &Grid) -> Result<CreateReport> {
        grid.validate()?;
        self.store.register_grid(&grid.name).await?;

        info!(grid = %grid.name, clusters = grid.clusters.len(), "Registered grid, provisioning clusters");

        let mut completions = CompletionSet::new(grid.clusters.len());
        for (index, spec) in grid.clusters.iter().enumerate() {
            let signal = completions.signal(index);
            let provider = self.providers.for_kind(spec.provider());
            let store = self.store.clone();
            let grid_name = grid.name.clone();
            let spec = spec.clone();

            tokio::spawn(async move {
                let outcome = provision_cluster(provider.as_ref(), &store, &grid_name, &spec).await;
                signal.complete(outcome);
            });
        }

        let names: Vec<String> = grid
            .clusters
            .iter()
            .map(|c| c.deterministic_name(&grid.name))
            .collect();

        let outcomes = completions
            .wait(|index, outcome| match outcome {
                Ok(()) => info!(grid = %grid.name, cluster = %names[index], "Cluster ready"),
                Err(e) => error!(grid = %grid.name, cluster = %names[index], error = %e, "Cluster failed"),
            })
            .await;

        let report = CreateReport {
            grid: grid.name.clone(),
            clusters: names
                .into_iter()
                .zip(outcomes)
                .map(|(name, outcome)| ClusterOutcome {
                    name,
                    error: outcome.err(),
                })
                .collect(),
        };

        match report.status() {
            CreateStatus::Succeeded => info!(grid = %grid.name, "Grid created"),
            status => warn!(
                grid = %grid.name,
                status = ?status,
                failed = report.failures().count(),
                "Grid created with failures"
            ),
        }

        Ok(report)
    }

    /// Delete a grid
    ///
    /// Clusters recorded as existing are skipped. Tear-down stops at the
    /// first failure, leaving the grid registered so the delete can be
    /// retried.
    pub async fn delete(&self, grid: &GridConfig) -> Result<()> {
        for cluster in grid.owned_clusters() {
            info!(grid = %grid.name, cluster = %cluster.name, "Deleting cluster");
            self.providers
                .for_kind(cluster.provider)
                .teardown(cluster)
                .await
                .inspect_err(|e| {
                    error!(grid = %grid.name, cluster = %cluster.name, error = %e, "Failed to delete cluster")
                })?;
        }

        self.store.remove_grid(&grid.name).await?;
        info!(grid = %grid.name, "Grid deleted");
        Ok(())
    }

    /// Look a grid up in the registry and delete it
    pub async fn delete_by_name(&self, name: &str) -> Result<()> {
        let grid = self
            .store
            .find_grid(name)
            .await?
            .ok_or_else(|| Error::GridNotFound {
                name: name.to_string(),
            })?;
        self.delete(&grid).await
    }

    /// All registered grids
    pub async fn list(&self) -> Result<Vec<GridConfig>> {
        self.store.list_grids().await
    }
}

#[instrument(skip_all, fields(grid = %grid_name, cluster = %spec.deterministic_name(grid_name)))]
async fn provision_cluster(
    provider: &dyn ClusterProvider,
    store: &GridStore,
    grid_name: &str,
    spec: &ClusterSpec,
) -> Completion {
    let cluster = match provider.provision(grid_name, spec).await {
        Ok(cluster) => cluster,
        Err(Error::Incomplete { cluster, source }) => {
            warn!(error = %source, "Cluster was created but is not ready, recording it for deletion");
            store
                .append_cluster(grid_name, *cluster)
                .await
                .map_err(|e| format!("{}; error saving config: {}", source, e))?;
            return Err(source.to_string());
        }
        Err(e) => return Err(e.to_string()),
    };

    store
        .append_cluster(grid_name, cluster)
        .await
        .map_err(|e| format!("error saving config: {}", e))
}
