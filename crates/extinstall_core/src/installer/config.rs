//! Installer filesystem layout and runtime configuration.
//!
//! # Responsibility
//! - Name every root the installer writes into.
//! - Load the layout from a JSON file or derive it from one root folder.
//!
//! # Invariants
//! - Paths are used as given; relative paths resolve against the process
//!   working directory.

use crate::model::extension::ClientId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATABASE_DRIVER: &str = "sqlite";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Roots the installer writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Application root.
    pub root: PathBuf,
    /// Public-facing application root (`client_id = 0`).
    pub site: PathBuf,
    /// Administrative application root (`client_id = 1`).
    pub administrator: PathBuf,
    pub plugins: PathBuf,
    pub libraries: PathBuf,
    /// Side registry holding manifests of file-sets, libraries and packages.
    pub manifests: PathBuf,
    pub media: PathBuf,
    /// Only `<install><sql><file driver=..>` entries for this driver run.
    #[serde(default = "default_database_driver")]
    pub database_driver: String,
}

fn default_database_driver() -> String {
    DEFAULT_DATABASE_DRIVER.to_string()
}

impl InstallerConfig {
    /// Default layout below one application root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let site = root.join("site");
        let administrator = root.join("administrator");
        Self {
            root: root.to_path_buf(),
            plugins: site.join("plugins"),
            libraries: site.join("libraries"),
            media: site.join("media"),
            manifests: administrator.join("manifests"),
            site,
            administrator,
            database_driver: default_database_driver(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn client_root(&self, client: ClientId) -> &Path {
        match client {
            ClientId::Site => &self.site,
            ClientId::Administrator => &self.administrator,
        }
    }

    /// Folder file-set `target` attributes resolve against.
    pub fn file_root(&self) -> &Path {
        &self.site
    }

    /// Side-registry folder for one kind, e.g. `<manifests>/packages`.
    pub fn manifest_store(&self, folder: &str) -> PathBuf {
        self.manifests.join(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_derives_default_layout() {
        let config = InstallerConfig::under("/srv/app");
        assert_eq!(config.site, Path::new("/srv/app/site"));
        assert_eq!(config.plugins, Path::new("/srv/app/site/plugins"));
        assert_eq!(config.manifests, Path::new("/srv/app/administrator/manifests"));
        assert_eq!(config.client_root(ClientId::Administrator), Path::new("/srv/app/administrator"));
        assert_eq!(config.database_driver, "sqlite");
    }

    #[test]
    fn load_fills_default_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installer.json");
        let mut value = serde_json::to_value(InstallerConfig::under("/srv/app")).unwrap();
        value.as_object_mut().unwrap().remove("database_driver");
        std::fs::write(&path, value.to_string()).unwrap();

        let config = InstallerConfig::load(&path).unwrap();
        assert_eq!(config, InstallerConfig::under("/srv/app"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installer.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            InstallerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
