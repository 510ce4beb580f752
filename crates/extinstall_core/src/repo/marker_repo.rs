//! Schema-version markers and pending-update markers.
//!
//! # Invariants
//! - At most one schema version row exists per extension.
//! - Pending-update markers are matched on `(type, element, client_id, folder)`.

use super::RepoResult;
use crate::model::extension::{ClientId, ExtensionId, ExtensionType};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Clone, Copy)]
pub struct MarkerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> MarkerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn schema_version(&self, extension_id: ExtensionId) -> RepoResult<Option<String>> {
        let version = self
            .conn
            .query_row(
                "SELECT version_id FROM schemas WHERE extension_id = ?1;",
                [extension_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(version)
    }

    pub fn set_schema_version(&self, extension_id: ExtensionId, version: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO schemas (extension_id, version_id) VALUES (?1, ?2)
            ON CONFLICT(extension_id) DO UPDATE SET version_id = excluded.version_id;",
            params![extension_id, version],
        )?;
        Ok(())
    }

    pub fn clear_schema_version(&self, extension_id: ExtensionId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM schemas WHERE extension_id = ?1;", [extension_id])?;
        Ok(())
    }

    /// Records an available update for an installed extension.
    pub fn add_pending_update(
        &self,
        kind: ExtensionType,
        element: &str,
        client_id: ClientId,
        folder: &str,
        version: &str,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO updates (element, type, client_id, folder, version)
            VALUES (?1, ?2, ?3, ?4, ?5);",
            params![element, kind.as_str(), client_id.as_i64(), folder, version],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn has_pending_update(
        &self,
        kind: ExtensionType,
        element: &str,
        client_id: ClientId,
        folder: &str,
    ) -> RepoResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM updates
            WHERE type = ?1 AND element = ?2 AND client_id = ?3 AND folder = ?4;",
            params![kind.as_str(), element, client_id.as_i64(), folder],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Removes pending-update markers now satisfied by an install or update.
    pub fn clear_pending_updates(
        &self,
        kind: ExtensionType,
        element: &str,
        client_id: ClientId,
        folder: &str,
    ) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM updates
            WHERE type = ?1 AND element = ?2 AND client_id = ?3 AND folder = ?4;",
            params![kind.as_str(), element, client_id.as_i64(), folder],
        )?;
        Ok(deleted)
    }
}
