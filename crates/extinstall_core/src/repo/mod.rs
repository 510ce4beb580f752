//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the catalog.
//! - Isolate SQLite query details from installer orchestration.
//!
//! # Invariants
//! - Extension writes must enforce `ExtensionRecord::validate()` before
//!   persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use crate::db::DbError;
use crate::model::extension::{ExtensionId, ExtensionValidationError};
use rusqlite::Connection;
use thiserror::Error;

pub mod asset_repo;
pub mod extension_repo;
pub mod marker_repo;
pub mod menu_repo;
pub mod module_repo;
pub mod template_style_repo;

pub use asset_repo::AssetRepository;
pub use extension_repo::{ExtensionRepository, SqliteExtensionRepository};
pub use marker_repo::MarkerRepository;
pub use menu_repo::MenuRepository;
pub use module_repo::ModuleRepository;
pub use template_style_repo::TemplateStyleRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for catalog persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    Validation(#[from] ExtensionValidationError),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("extension not found: {0}")]
    NotFound(ExtensionId),
    #[error("invalid persisted catalog data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// All catalog repositories over one connection.
#[derive(Clone, Copy)]
pub struct Catalog<'conn> {
    pub extensions: SqliteExtensionRepository<'conn>,
    pub menus: MenuRepository<'conn>,
    pub modules: ModuleRepository<'conn>,
    pub styles: TemplateStyleRepository<'conn>,
    pub markers: MarkerRepository<'conn>,
    pub assets: AssetRepository<'conn>,
}

impl<'conn> Catalog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            extensions: SqliteExtensionRepository::new(conn),
            menus: MenuRepository::new(conn),
            modules: ModuleRepository::new(conn),
            styles: TemplateStyleRepository::new(conn),
            markers: MarkerRepository::new(conn),
            assets: AssetRepository::new(conn),
        }
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
