//! Grid registry store
//!
//! The registry is a YAML file listing every grid and the clusters that
//! finished provisioning. Every read-modify-write happens while holding a
//! [`RegistryLock`], which combines:
//!
//! - an in-process async mutex, serialising the concurrent cluster tasks of
//!   one run, and
//! - an exclusive `flock` on `<registry>.lock`, serialising separate
//!   invocations against the same file.
//!
//! The lock is cooperative: it only excludes writers that take it too.
//! `load` and `save` are only reachable through the lock guard, and the guard
//! releases both locks when dropped, on every exit path.

mod flock;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::types::{ClusterConfig, GridConfig, GridsConfig};
use crate::{Error, Result};

/// Handle to a registry file
#[derive(Clone, Debug)]
pub struct GridStore {
    path: PathBuf,
    local: Arc<Mutex<()>>,
}

impl GridStore {
    /// Create a store for the registry file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            local: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Enter the registry's critical section
    pub async fn lock(&self) -> Result<RegistryLock> {
        let local = self.local.clone().lock_owned().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::registry(&self.path, format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let lock_path = self.lock_path();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .await
            .map_err(|e| {
                Error::registry(
                    &self.path,
                    format!("failed to open lock file {}: {}", lock_path.display(), e),
                )
            })?
            .into_std()
            .await;

        let file = tokio::task::spawn_blocking(move || {
            flock::acquire_exclusive_blocking(&file).map(|()| file)
        })
        .await
        .map_err(|e| Error::registry(&self.path, format!("lock task failed: {}", e)))?
        .map_err(|e| Error::registry(&self.path, format!("failed to lock registry: {}", e)))?;

        debug!(path = %self.path.display(), "Acquired registry lock");

        Ok(RegistryLock {
            path: self.path.clone(),
            _file: file,
            _local: local,
        })
    }

    /// All registered grids
    pub async fn list_grids(&self) -> Result<Vec<GridConfig>> {
        let lock = self.lock().await?;
        Ok(lock.load().await?.grids)
    }

    /// A registered grid by name
    pub async fn find_grid(&self, name: &str) -> Result<Option<GridConfig>> {
        let lock = self.lock().await?;
        Ok(lock.load().await?.find(name).cloned())
    }

    /// Register an empty grid. Fails without touching the file if the name is
    /// already registered.
    pub async fn register_grid(&self, name: &str) -> Result<()> {
        let lock = self.lock().await?;
        let mut config = lock.load().await?;

        if config.contains(name) {
            return Err(Error::GridAlreadyExists {
                name: name.to_string(),
            });
        }

        config.grids.push(GridConfig::new(name));
        lock.save(&config).await
    }

    /// Append a provisioned cluster to a registered grid
    pub async fn append_cluster(&self, grid_name: &str, cluster: ClusterConfig) -> Result<()> {
        let lock = self.lock().await?;
        let mut config = lock.load().await?;

        let grid = config.find_mut(grid_name).ok_or_else(|| Error::GridNotFound {
            name: grid_name.to_string(),
        })?;
        grid.clusters.push(cluster);

        lock.save(&config).await
    }

    /// Remove a grid and all its cluster records
    pub async fn remove_grid(&self, name: &str) -> Result<()> {
        let lock = self.lock().await?;
        let mut config = lock.load().await?;

        if config.remove(name).is_none() {
            return Err(Error::GridNotFound {
                name: name.to_string(),
            });
        }

        lock.save(&config).await
    }
}

/// Scoped exclusive access to the registry file
///
/// Dropping the guard closes the lock file (releasing the `flock`) and then
/// releases the in-process mutex.
#[derive(Debug)]
pub struct RegistryLock {
    path: PathBuf,
    _file: File,
    _local: OwnedMutexGuard<()>,
}

impl RegistryLock {
    /// Read the registry. A missing or empty file reads as an empty registry.
    pub async fn load(&self) -> Result<GridsConfig> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GridsConfig::default()),
            Err(e) => return Err(Error::registry(&self.path, format!("failed to read: {}", e))),
        };

        if data.trim().is_empty() {
            return Ok(GridsConfig::default());
        }

        serde_yaml::from_str(&data)
            .map_err(|e| Error::registry(&self.path, format!("failed to parse: {}", e)))
    }

    /// Write the registry, replacing the file atomically
    pub async fn save(&self, config: &GridsConfig) -> Result<()> {
        let data = serde_yaml::to_string(config)
            .map_err(|e| Error::serialization(format!("failed to serialize registry: {}", e)))?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, data).await.map_err(|e| {
            Error::registry(&self.path, format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::registry(&self.path, format!("failed to replace: {}", e)))?;

        debug!(path = %self.path.display(), grids = config.grids.len(), "Saved registry");
        Ok(())
    }
}
