//! State file for the mock cloud
//!
//! Lets several `arc` invocations share one mock cloud. The previous file is
//! kept as `<file>.backup` on every save.

use crate::cloud::{MockCloud, STATE_VERSION};
use arc_cloud::{CloudError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reads and writes [`MockCloud`] as JSON
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Load the state; a missing file is an empty cloud
    pub async fn load(&self) -> Result<MockCloud> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "state file not found, starting empty");
            return Ok(MockCloud::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let cloud: MockCloud = serde_json::from_str(&content)?;

        if cloud.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                cloud.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            instances = cloud.instances.len(),
            networks = cloud.networks.len(),
            "loaded mock state"
        );
        Ok(cloud)
    }

    pub async fn save(&self, cloud: &MockCloud) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir).await?;
        }

        if self.path.exists() {
            let backup = self.backup_path();
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&self.path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(cloud)?;
        fs::write(&self.path, content).await?;

        tracing::debug!(path = %self.path.display(), "saved mock state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_cloud::NetworkSpec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("mock").join("state.json"));

        let mut cloud = MockCloud::new();
        cloud
            .create_network(&NetworkSpec {
                name: "dev".to_string(),
                cidr: "10.0.0.0/16".to_string(),
            })
            .unwrap();
        store.save(&cloud).await.unwrap();
        store.save(&cloud).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.networks.len(), 1);
        assert!(temp_dir.path().join("mock/state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"));

        let cloud = store.load().await.unwrap();
        assert!(cloud.instances.is_empty());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"));

        let mut cloud = MockCloud::new();
        cloud.version = STATE_VERSION + 1;
        store.save(&cloud).await.unwrap();

        assert!(matches!(
            store.load().await,
            Err(CloudError::StateError(_))
        ));
    }
}
