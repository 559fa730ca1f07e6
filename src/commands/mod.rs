//! CLI commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::config::{self, ProvisionTimeouts};
use crate::grid::GridOrchestrator;
use crate::provider::{EksProvider, Providers};
use crate::store::GridStore;
use crate::Result;

pub mod create;
pub mod delete;
pub mod list;

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Registry file (defaults to ~/.kubectl-grid/config.yaml)
    #[arg(long = "config-file", global = true, env = config::CONFIG_FILE_ENV)]
    pub config_file: Option<PathBuf>,
}

impl GlobalArgs {
    /// Store for the resolved registry path
    pub fn store(&self) -> Result<GridStore> {
        let path = config::resolve_config_path(self.config_file.clone())?;
        Ok(GridStore::new(path))
    }
}

/// Readiness wait overrides
#[derive(Args, Debug, Clone)]
pub struct TimeoutArgs {
    /// Seconds to wait for a new control plane to become active
    #[arg(long, default_value_t = config::DEFAULT_CONTROL_PLANE_TIMEOUT.as_secs())]
    pub control_plane_timeout: u64,

    /// Seconds to wait for a node group to finish deleting
    #[arg(long, default_value_t = config::DEFAULT_NODE_GROUP_DELETE_TIMEOUT.as_secs())]
    pub node_group_delete_timeout: u64,

    /// Seconds between readiness checks
    #[arg(long, default_value_t = config::DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,
}

impl From<&TimeoutArgs> for ProvisionTimeouts {
    fn from(args: &TimeoutArgs) -> Self {
        Self {
            control_plane: Duration::from_secs(args.control_plane_timeout),
            node_group_delete: Duration::from_secs(args.node_group_delete_timeout),
            poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        }
    }
}

/// Orchestrator over the registry using the AWS SDK backed providers
pub fn orchestrator(global: &GlobalArgs, timeouts: ProvisionTimeouts) -> Result<GridOrchestrator> {
    let providers = Providers::new(Arc::new(EksProvider::new(timeouts)));
    Ok(GridOrchestrator::new(global.store()?, providers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_args_convert_to_durations() {
        let args = TimeoutArgs {
            control_plane_timeout: 60,
            node_group_delete_timeout: 30,
            poll_interval: 0,
        };
        let timeouts = ProvisionTimeouts::from(&args);
        assert_eq!(timeouts.control_plane, Duration::from_secs(60));
        assert_eq!(timeouts.node_group_delete, Duration::from_secs(30));
        assert_eq!(timeouts.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn explicit_config_file_is_used() {
        let global = GlobalArgs {
            config_file: Some(PathBuf::from("/tmp/grids.yaml")),
        };
        assert_eq!(global.store().unwrap().path(), PathBuf::from("/tmp/grids.yaml"));
    }
}
