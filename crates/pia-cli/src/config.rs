//! File-backed `ConfigStore` (spec.md 6: `config.yaml`). The minimal
//! stand-in the base spec's Non-goals permit - no migration tooling, no
//! setup wizard, just read/write the recognized shape at a fixed path.

use pia_controller::{Config, ConfigStore, ConfigStoreError};
use std::path::{Path, PathBuf};

pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<Config, ConfigStoreError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigStoreError::Io(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigStoreError::Malformed(e.to_string()))
    }

    fn save(&self, config: &Config) -> Result<(), ConfigStoreError> {
        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigStoreError::Malformed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigStoreError::Io(e.to_string()))?;
        }
        std::fs::write(&self.path, yaml).map_err(|e| ConfigStoreError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pia_controller::{ConfigMetadata, ConfigPreferences};
    use pia_profile::RegionId;

    #[test]
    fn round_trips_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlConfigStore::new(dir.path().join("config.yaml"));
        let config = Config {
            regions: vec![RegionId::new("us-east")],
            preferences: ConfigPreferences::default(),
            metadata: ConfigMetadata::default(),
        };

        store.save(&config).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.regions, config.regions);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlConfigStore::new(dir.path().join("missing.yaml"));
        assert!(matches!(store.load(), Err(ConfigStoreError::Io(_))));
    }
}
