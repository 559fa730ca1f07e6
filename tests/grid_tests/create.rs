//! Grid creation stories

use std::time::Duration;

use kubectl_grid::grid::CreateStatus;
use kubectl_grid::types::Grid;
use kubectl_grid::Error;

use super::helpers::{existing_cluster, new_cluster, FakeProvider, Harness};

/// A platform engineer points a grid at one cluster they already run. The
/// grid is recorded with that cluster, marked as existing, with a kubeconfig.
#[tokio::test]
async fn story_existing_cluster_is_recorded_as_existing() {
    let harness = Harness::new(FakeProvider::new());
    let grid = Grid::new("g1", vec![existing_cluster("us-west-2", "c1")]);

    let report = harness.orchestrator.create(&grid).await.unwrap();
    assert_eq!(report.status(), CreateStatus::Succeeded);

    let grids = harness.orchestrator.list().await.unwrap();
    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0].name, "g1");
    assert_eq!(grids[0].clusters.len(), 1);

    let cluster = &grids[0].clusters[0];
    assert_eq!(cluster.name, "aws-us-west-2-c1");
    assert!(cluster.is_existing);
    assert!(cluster.kubeconfig.is_some());
}

/// Clusters that take different amounts of time are all waited for, and all
/// of them land in the registry even though they finish concurrently.
#[tokio::test]
async fn story_concurrent_clusters_all_land_in_registry() {
    let harness = Harness::new(FakeProvider::new().with_delay(Duration::from_millis(20)));
    let clusters = (0..12)
        .map(|i| new_cluster("us-east-1", &format!("c{}", i)))
        .collect();
    let grid = Grid::new("wide", clusters);

    let report = harness.orchestrator.create(&grid).await.unwrap();
    assert_eq!(report.status(), CreateStatus::Succeeded);
    assert_eq!(harness.provider.provisioned().len(), 12);

    let stored = harness.store().find_grid("wide").await.unwrap().unwrap();
    assert_eq!(stored.clusters.len(), 12);
}

/// One cluster never becomes ready. Its siblings still finish and are
/// recorded; the report names the failure.
#[tokio::test]
async fn story_one_failure_does_not_stop_siblings() {
    let harness = Harness::new(FakeProvider::new().failing("slow"));
    let grid = Grid::new(
        "g1",
        vec![
            new_cluster("us-east-1", "a"),
            new_cluster("us-east-1", "slow"),
            existing_cluster("us-west-2", "prod"),
        ],
    );

    let report = harness.orchestrator.create(&grid).await.unwrap();
    assert_eq!(report.status(), CreateStatus::Partial);

    let failures: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failures, vec!["aws-us-east-1-slow"]);

    let stored = harness.store().find_grid("g1").await.unwrap().unwrap();
    let mut names: Vec<_> = stored.clusters.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["aws-us-east-1-a", "aws-us-west-2-prod"]);
}

/// Creating a grid whose name is taken changes nothing on disk and never
/// reaches the cloud.
#[tokio::test]
async fn story_duplicate_grid_leaves_registry_untouched() {
    let harness = Harness::new(FakeProvider::new());
    harness
        .orchestrator
        .create(&Grid::new("g1", vec![existing_cluster("us-west-2", "c1")]))
        .await
        .unwrap();

    let path = harness.dir.path().join("config.yaml");
    let before = std::fs::read(&path).unwrap();

    let err = harness
        .orchestrator
        .create(&Grid::new("g1", vec![new_cluster("us-east-1", "x")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::GridAlreadyExists { .. }));
    assert!(err.to_string().contains("kubectl grid delete g1"));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(harness.provider.provisioned(), vec!["aws-us-west-2-c1"]);
}

/// Two entries that would share a cluster name are rejected before anything
/// is registered.
#[tokio::test]
async fn story_conflicting_cluster_names_are_rejected_up_front() {
    let harness = Harness::new(FakeProvider::new());
    let grid = Grid::new(
        "g1",
        vec![new_cluster("us-east-1", "a"), new_cluster("us-east-1", "a")],
    );

    let err = harness.orchestrator.create(&grid).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(harness.orchestrator.list().await.unwrap().is_empty());
    assert!(harness.provider.provisioned().is_empty());
}
