//! Extension installer lifecycle engine.
//!
//! Installs, updates, uninstalls and discovers application extensions of
//! seven kinds against a SQLite catalog and a local file tree. Every install
//! either completes or leaves no trace: side effects are recorded on a
//! rollback stack and reversed when a phase fails.

pub mod adapter;
pub mod db;
pub mod fs;
pub mod installer;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod repo;
pub mod unpack;

pub use db::{open_db, open_db_in_memory, DbError};
pub use fs::{Filesystem, FsError, LocalFilesystem};
pub use installer::{
    ChildResult, InstallContext, InstallError, InstallResult, InstallRoute, Installer, InstallerConfig,
    InstallerScript, PathKey, RollbackStep, ScriptContext, ScriptError, ScriptRegistry, UninstallReport,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use manifest::{JsonManifestReader, ManifestNode, ManifestReader, ManifestView};
pub use model::extension::{ClientId, ExtensionId, ExtensionRecord, ExtensionType};
pub use repo::{ExtensionRepository, RepoError, SqliteExtensionRepository};
pub use unpack::{ArchiveUnpacker, PackageUnpacker};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
