//! Create command - Provision every cluster in a grid manifest
//!
//! Usage: kubectl-grid create --from-yaml <path> [--name <grid>]

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use super::{GlobalArgs, TimeoutArgs};
use crate::grid::{CreateReport, CreateStatus};
use crate::types::Grid;
use crate::{Error, Result};

/// Create a new grid
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to YAML manifest describing the grid to create
    #[arg(long = "from-yaml")]
    pub from_yaml: PathBuf,

    /// Name of the grid, overriding the name in the manifest's metadata.name field
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,

    #[command(flatten)]
    pub(crate) timeouts: TimeoutArgs,
}

/// Read a manifest, applying a name override
pub async fn load_grid(path: &Path, name: Option<&str>) -> Result<Grid> {
    let data = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::validation(format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut grid = Grid::from_yaml(&data)?;
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        grid.name = name.to_string();
    }
    Ok(grid)
}

/// Run the create command
pub async fn run(args: CreateArgs, global: &GlobalArgs) -> Result<()> {
    let grid = load_grid(&args.from_yaml, args.name.as_deref()).await?;
    let orchestrator = super::orchestrator(global, (&args.timeouts).into())?;

    // Per-cluster failures are in the report; only registry-level errors
    // fail the command.
    let report = orchestrator.create(&grid).await?;
    print_report(&report);

    if report.status() == CreateStatus::Succeeded {
        info!(grid = %report.grid, "All clusters ready");
    }
    Ok(())
}

fn print_report(report: &CreateReport) {
    println!("{:<40} STATUS", "CLUSTER");
    for cluster in &report.clusters {
        match &cluster.error {
            None => println!("{:<40} ready", cluster.name),
            Some(e) => println!("{:<40} failed: {}", cluster.name, e),
        }
    }
}
