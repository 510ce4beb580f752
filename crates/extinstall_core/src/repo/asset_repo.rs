//! Access-control asset nodes registered by components.

use super::RepoResult;
use crate::model::catalog::Asset;
use rusqlite::{params, Connection, OptionalExtension};

/// Root asset every component node hangs from.
pub const ROOT_ASSET_ID: i64 = 1;

#[derive(Clone, Copy)]
pub struct AssetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AssetRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_name(&self, name: &str) -> RepoResult<Option<Asset>> {
        let asset = self
            .conn
            .query_row(
                "SELECT id, parent_id, name, title, rules FROM assets WHERE name = ?1;",
                [name],
                |row| {
                    Ok(Asset {
                        id: Some(row.get(0)?),
                        parent_id: row.get(1)?,
                        name: row.get(2)?,
                        title: row.get(3)?,
                        rules: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(asset)
    }

    pub fn insert(&self, asset: &Asset) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO assets (parent_id, name, title, rules) VALUES (?1, ?2, ?3, ?4);",
            params![
                asset.parent_id,
                asset.name.as_str(),
                asset.title.as_str(),
                asset.rules.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_by_name(&self, name: &str) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM assets WHERE name = ?1;", [name])?;
        Ok(deleted)
    }
}
