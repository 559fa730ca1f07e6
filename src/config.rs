//! Runtime configuration
//!
//! The registry file path is resolved by priority (highest first):
//! 1. Explicit `--config-file` flag
//! 2. `KUBECTL_GRID_CONFIG` environment variable
//! 3. `~/.kubectl-grid/config.yaml`

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

const CONFIG_DIR_NAME: &str = ".kubectl-grid";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the registry path
pub const CONFIG_FILE_ENV: &str = "KUBECTL_GRID_CONFIG";

/// Default wait for an EKS control plane to become active. Fifteen minutes
/// is not unusual.
pub const DEFAULT_CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default wait for a node group to finish deleting
pub const DEFAULT_NODE_GROUP_DELETE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default interval between readiness checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Time budgets for readiness polling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProvisionTimeouts {
    /// Maximum wait for a new control plane to become active
    pub control_plane: Duration,
    /// Maximum wait for a node group to disappear during teardown
    pub node_group_delete: Duration,
    /// Interval between checks
    pub poll_interval: Duration,
}

impl Default for ProvisionTimeouts {
    fn default() -> Self {
        Self {
            control_plane: DEFAULT_CONTROL_PLANE_TIMEOUT,
            node_group_delete: DEFAULT_NODE_GROUP_DELETE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// `~/.kubectl-grid/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::validation("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve the registry path: `explicit` when set and non-empty, otherwise
/// the default. The CLI fills `explicit` from the flag or the environment.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/explicit/grids.yaml"))).unwrap();
        assert_eq!(path, PathBuf::from("/explicit/grids.yaml"));
    }

    #[test]
    fn empty_path_falls_back_to_default() {
        // Depends on a home directory being resolvable on the test machine
        if let Ok(default) = default_config_path() {
            let path = resolve_config_path(Some(PathBuf::new())).unwrap();
            assert_eq!(path, default);
            assert!(path.ends_with(".kubectl-grid/config.yaml"));
        }
    }

    #[test]
    fn default_timeouts_allow_slow_control_planes() {
        let timeouts = ProvisionTimeouts::default();
        assert!(timeouts.control_plane >= Duration::from_secs(15 * 60));
        assert!(timeouts.poll_interval < timeouts.control_plane);
    }
}
