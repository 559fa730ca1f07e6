//! Grid deletion stories

use kubectl_grid::grid::CreateStatus;
use kubectl_grid::types::Grid;
use kubectl_grid::Error;

use super::helpers::{existing_cluster, new_cluster, FakeProvider, Harness};

/// A grid made only of clusters the team already ran is deleted without a
/// single teardown call, and disappears from the registry.
#[tokio::test]
async fn story_existing_only_grid_deletes_without_teardown() {
    let harness = Harness::new(FakeProvider::new());
    harness
        .orchestrator
        .create(&Grid::new(
            "g1",
            vec![
                existing_cluster("us-west-2", "c1"),
                existing_cluster("eu-west-1", "c2"),
            ],
        ))
        .await
        .unwrap();

    harness.orchestrator.delete_by_name("g1").await.unwrap();

    assert!(harness.provider.torn_down().is_empty());
    assert!(harness.orchestrator.list().await.unwrap().is_empty());
}

/// Mixed grids only lose the clusters they created.
#[tokio::test]
async fn story_mixed_grid_tears_down_created_clusters_only() {
    let harness = Harness::new(FakeProvider::new());
    harness
        .orchestrator
        .create(&Grid::new(
            "g1",
            vec![
                existing_cluster("us-west-2", "prod"),
                new_cluster("us-east-1", "scratch"),
            ],
        ))
        .await
        .unwrap();

    harness.orchestrator.delete_by_name("g1").await.unwrap();

    assert_eq!(harness.provider.torn_down(), vec!["aws-us-east-1-scratch"]);
    assert!(harness.store().find_grid("g1").await.unwrap().is_none());
}

/// A cluster whose control plane was created but never became ready is still
/// deleted with its grid rather than left behind in the cloud.
#[tokio::test]
async fn story_created_but_unready_cluster_is_torn_down() {
    let harness = Harness::new(FakeProvider::new().stuck("edge"));
    let report = harness
        .orchestrator
        .create(&Grid::new(
            "g1",
            vec![
                new_cluster("us-east-1", "edge"),
                existing_cluster("us-west-2", "prod"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(report.status(), CreateStatus::Partial);

    harness.orchestrator.delete_by_name("g1").await.unwrap();

    assert_eq!(harness.provider.torn_down(), vec!["aws-us-east-1-edge"]);
    assert!(harness.orchestrator.list().await.unwrap().is_empty());
}

/// Deleting a grid that was never created is reported as not found.
#[tokio::test]
async fn story_unknown_grid_is_not_found() {
    let harness = Harness::new(FakeProvider::new());
    let err = harness.orchestrator.delete_by_name("ghost").await.unwrap_err();
    assert!(matches!(err, Error::GridNotFound { ref name } if name == "ghost"));
}

/// Other grids in the same registry survive a delete.
#[tokio::test]
async fn story_delete_leaves_other_grids() {
    let harness = Harness::new(FakeProvider::new());
    for name in ["a", "b"] {
        harness
            .orchestrator
            .create(&Grid::new(name, vec![existing_cluster("us-west-2", name)]))
            .await
            .unwrap();
    }

    harness.orchestrator.delete_by_name("a").await.unwrap();

    let remaining: Vec<_> = harness
        .orchestrator
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(remaining, vec!["b"]);
}
