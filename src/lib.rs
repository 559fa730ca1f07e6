//! kubectl-grid - provision and tear down grids of managed Kubernetes clusters
//!
//! A grid is a named set of clusters described in one manifest. Some clusters
//! already exist and are only connected to; others are created from scratch,
//! including their network, security group, subnets and IAM role. Every
//! cluster that becomes usable is recorded, with a kubeconfig, in a local
//! registry file.
//!
//! # Architecture
//!
//! - Creating a grid fans out one task per cluster and fans back in once
//!   every task has reported success or failure
//! - Cloud resources are found by an ownership tag before being created, so
//!   re-running after a partial failure converges instead of duplicating
//! - The registry is only read or written while holding a process-local mutex
//!   and a file lock, so concurrent tasks and invocations do not lose updates
//! - Deleting a grid never touches clusters it only connected to
//!
//! # Modules
//!
//! - [`types`] - Grid manifest and registry records
//! - [`grid`] - Grid create/delete/list orchestration
//! - [`provider`] - Cluster provider abstraction and the EKS provider
//! - [`store`] - Locked registry file access
//! - [`secret`] - Literal and environment-sourced secret values
//! - [`config`] - Registry path resolution and readiness timeouts
//! - [`poll`] - Timeout-bounded polling
//! - [`commands`] - CLI commands
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;
pub mod grid;
pub mod poll;
pub mod provider;
pub mod secret;
pub mod store;
pub mod types;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

use clap::{Parser, Subcommand};

/// kubectl-grid - manage grids of Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "kubectl-grid")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub(crate) global: commands::GlobalArgs,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new grid from a manifest
    Create(commands::create::CreateArgs),
    /// Delete a grid and the clusters it created
    Delete(commands::delete::DeleteArgs),
    /// List registered grids
    List(commands::list::ListArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Create(args) => commands::create::run(args, &self.global).await,
            Commands::Delete(args) => commands::delete::run(args, &self.global).await,
            Commands::List(args) => commands::list::run(args, &self.global).await,
        }
    }
}
