//! Extension record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide `find/load/store/delete` over the `extensions` table.
//! - Keep SQL details inside the catalog persistence boundary.
//!
//! # Invariants
//! - Write paths must call `ExtensionRecord::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.

use super::{bool_to_int, RepoError, RepoResult};
use crate::model::extension::{
    ClientId, ExtensionId, ExtensionLookup, ExtensionRecord, ExtensionType,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const EXTENSION_SELECT_SQL: &str = "SELECT
    extension_id,
    name,
    type,
    element,
    folder,
    client_id,
    enabled,
    access,
    protected,
    params,
    manifest_cache,
    custom_data,
    system_data,
    ordering,
    state
FROM extensions";

/// Catalog record store contract.
pub trait ExtensionRepository {
    /// Returns the id of the record matching every non-`None` lookup field.
    fn find(&self, lookup: &ExtensionLookup) -> RepoResult<Option<ExtensionId>>;
    fn load(&self, id: ExtensionId) -> RepoResult<ExtensionRecord>;
    /// Inserts when `extension_id` is `None`, updates otherwise. The
    /// assigned id is written back into `record`.
    fn store(&self, record: &mut ExtensionRecord) -> RepoResult<ExtensionId>;
    fn delete(&self, id: ExtensionId) -> RepoResult<()>;
    fn list(&self, kind: Option<ExtensionType>) -> RepoResult<Vec<ExtensionRecord>>;
}

/// SQLite-backed extension repository.
#[derive(Clone, Copy)]
pub struct SqliteExtensionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExtensionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ExtensionRepository for SqliteExtensionRepository<'_> {
    fn find(&self, lookup: &ExtensionLookup) -> RepoResult<Option<ExtensionId>> {
        let mut sql = String::from(
            "SELECT extension_id FROM extensions WHERE type = ? AND element = ?",
        );
        let mut values = vec![
            Value::Text(lookup.kind.as_str().to_string()),
            Value::Text(lookup.element.clone()),
        ];

        if let Some(folder) = &lookup.folder {
            sql.push_str(" AND folder = ?");
            values.push(Value::Text(folder.clone()));
        }
        if let Some(client_id) = lookup.client_id {
            sql.push_str(" AND client_id = ?");
            values.push(Value::Integer(client_id.as_i64()));
        }
        sql.push_str(" ORDER BY extension_id ASC LIMIT 1;");

        let id = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id)
    }

    fn load(&self, id: ExtensionId) -> RepoResult<ExtensionRecord> {
        let sql = format!("{EXTENSION_SELECT_SQL} WHERE extension_id = ?1;");
        let record = self
            .conn
            .query_row(&sql, params![id], parse_extension_row)
            .optional()?;
        match record {
            Some(record) => record,
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn store(&self, record: &mut ExtensionRecord) -> RepoResult<ExtensionId> {
        record.validate()?;

        match record.extension_id {
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE extensions
                    SET
                        name = ?1,
                        type = ?2,
                        element = ?3,
                        folder = ?4,
                        client_id = ?5,
                        enabled = ?6,
                        access = ?7,
                        protected = ?8,
                        params = ?9,
                        manifest_cache = ?10,
                        custom_data = ?11,
                        system_data = ?12,
                        ordering = ?13,
                        state = ?14
                    WHERE extension_id = ?15;",
                    params![
                        record.name.as_str(),
                        record.kind.as_str(),
                        record.element.as_str(),
                        record.folder.as_str(),
                        record.client_id.as_i64(),
                        bool_to_int(record.enabled),
                        record.access,
                        bool_to_int(record.protected),
                        record.params.as_str(),
                        record.manifest_cache.as_str(),
                        record.custom_data.as_str(),
                        record.system_data.as_str(),
                        record.ordering,
                        record.state,
                        id,
                    ],
                )?;
                if changed == 0 {
                    return Err(RepoError::NotFound(id));
                }
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO extensions (
                        name,
                        type,
                        element,
                        folder,
                        client_id,
                        enabled,
                        access,
                        protected,
                        params,
                        manifest_cache,
                        custom_data,
                        system_data,
                        ordering,
                        state
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
                    params![
                        record.name.as_str(),
                        record.kind.as_str(),
                        record.element.as_str(),
                        record.folder.as_str(),
                        record.client_id.as_i64(),
                        bool_to_int(record.enabled),
                        record.access,
                        bool_to_int(record.protected),
                        record.params.as_str(),
                        record.manifest_cache.as_str(),
                        record.custom_data.as_str(),
                        record.system_data.as_str(),
                        record.ordering,
                        record.state,
                    ],
                )?;
                let id = self.conn.last_insert_rowid();
                record.extension_id = Some(id);
                Ok(id)
            }
        }
    }

    fn delete(&self, id: ExtensionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM extensions WHERE extension_id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list(&self, kind: Option<ExtensionType>) -> RepoResult<Vec<ExtensionRecord>> {
        let mut sql = String::from(EXTENSION_SELECT_SQL);
        let mut values = Vec::new();
        if let Some(kind) = kind {
            sql.push_str(" WHERE type = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        sql.push_str(" ORDER BY extension_id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_extension_row(row)??);
        }
        Ok(records)
    }
}

fn parse_extension_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<ExtensionRecord>> {
    let kind_raw: String = row.get(2)?;
    let client_raw: i64 = row.get(5)?;

    let Some(kind) = ExtensionType::parse(&kind_raw) else {
        return Ok(Err(RepoError::InvalidData(format!(
            "unknown extension type `{kind_raw}`"
        ))));
    };
    let Some(client_id) = ClientId::from_i64(client_raw) else {
        return Ok(Err(RepoError::InvalidData(format!(
            "unknown client id `{client_raw}`"
        ))));
    };

    Ok(Ok(ExtensionRecord {
        extension_id: Some(row.get(0)?),
        name: row.get(1)?,
        kind,
        element: row.get(3)?,
        folder: row.get(4)?,
        client_id,
        enabled: row.get::<_, i64>(6)? != 0,
        access: row.get(7)?,
        protected: row.get::<_, i64>(8)? != 0,
        params: row.get(9)?,
        manifest_cache: row.get(10)?,
        custom_data: row.get(11)?,
        system_data: row.get(12)?,
        ordering: row.get(13)?,
        state: row.get(14)?,
    }))
}
