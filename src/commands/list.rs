//! List command - Show registered grids and their clusters

use clap::Args;

use super::GlobalArgs;
use crate::types::GridConfig;
use crate::Result;

/// List grids
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Run the list command
pub async fn run(_args: ListArgs, global: &GlobalArgs) -> Result<()> {
    let grids = global.store()?.list_grids().await?;
    print!("{}", format_grids(&grids));
    Ok(())
}

fn format_grids(grids: &[GridConfig]) -> String {
    if grids.is_empty() {
        return "No grids found\n".to_string();
    }

    let mut out = format!("{:<24} {:<40} {:<14} {}\n", "GRID", "CLUSTER", "REGION", "OWNED");
    for grid in grids {
        if grid.clusters.is_empty() {
            out.push_str(&format!("{:<24} {:<40} {:<14} {}\n", grid.name, "-", "-", "-"));
        }
        for cluster in &grid.clusters {
            out.push_str(&format!(
                "{:<24} {:<40} {:<14} {}\n",
                grid.name,
                cluster.name,
                cluster.region,
                if cluster.is_existing { "no" } else { "yes" }
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterConfig, ProviderKind};

    #[test]
    fn empty_registry_says_so() {
        assert_eq!(format_grids(&[]), "No grids found\n");
    }

    #[test]
    fn one_row_per_cluster() {
        let grid = GridConfig {
            name: "g1".to_string(),
            clusters: vec![ClusterConfig {
                name: "aws-us-west-2-prod".to_string(),
                provider: ProviderKind::Aws,
                is_existing: true,
                region: "us-west-2".to_string(),
                identifier: "prod".to_string(),
                kubeconfig: None,
                credentials: None,
            }],
        };
        let out = format_grids(&[grid, GridConfig::new("empty")]);
        let lines: Vec<_> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("aws-us-west-2-prod"));
        assert!(lines[1].ends_with("no"));
        assert!(lines[2].starts_with("empty"));
    }
}
