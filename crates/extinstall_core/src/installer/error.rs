//! Installer error taxonomy.

use crate::db::DbError;
use crate::fs::FsError;
use crate::manifest::ManifestError;
use crate::model::extension::ExtensionId;
use crate::repo::RepoError;
use crate::unpack::UnpackError;
use thiserror::Error;

pub type InstallResult<T> = Result<T, InstallError>;

#[derive(Debug, Error)]
pub enum InstallError {
    /// Missing manifest data, unknown client/kind, or a path collision
    /// without overwrite permission.
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("filesystem failure: {0}")]
    Filesystem(#[from] FsError),
    #[error("catalog failure: {0}")]
    Catalog(#[from] RepoError),
    #[error("script hook `{hook}` failed: {message}")]
    ScriptHook { hook: &'static str, message: String },
    #[error("child extension `{child}` failed: {source}")]
    ChildInstall {
        child: String,
        #[source]
        source: Box<InstallError>,
    },
    #[error("{0}")]
    Manifest(#[from] ManifestError),
    #[error("{0}")]
    Unpack(#[from] UnpackError),
    #[error("extension not found: {0}")]
    NotFound(String),
    #[error("extension {0} is protected and cannot be uninstalled")]
    Protected(ExtensionId),
    #[error("installation aborted: {0}")]
    Aborted(String),
}

impl InstallError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition_failed",
            Self::Filesystem(_) => "filesystem_failed",
            Self::Catalog(_) => "catalog_failed",
            Self::ScriptHook { .. } => "script_hook_failed",
            Self::ChildInstall { .. } => "child_install_failed",
            Self::Manifest(_) => "manifest_invalid",
            Self::Unpack(_) => "unpack_failed",
            Self::NotFound(_) => "not_found",
            Self::Protected(_) => "protected",
            Self::Aborted(_) => "aborted",
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}

impl From<rusqlite::Error> for InstallError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Catalog(RepoError::from(value))
    }
}

impl From<DbError> for InstallError {
    fn from(value: DbError) -> Self {
        Self::Catalog(RepoError::Db(value))
    }
}
