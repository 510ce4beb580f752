//! Catalog schema migrations.
//!
//! # Invariants
//! - Steps are listed in strictly increasing `version` order.
//! - The applied version is mirrored to `PRAGMA user_version`, inside the
//!   same transaction as the step's DDL.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct CatalogMigration {
    version: u32,
    /// Short label used in log events.
    label: &'static str,
    sql: &'static str,
}

const CATALOG_MIGRATIONS: &[CatalogMigration] = &[
    CatalogMigration {
        version: 1,
        label: "extensions",
        sql: include_str!("0001_extensions.sql"),
    },
    CatalogMigration {
        version: 2,
        label: "side_tables",
        sql: include_str!("0002_side_tables.sql"),
    },
];

/// Newest catalog schema version this build understands.
pub fn latest_version() -> u32 {
    CATALOG_MIGRATIONS.last().map_or(0, |step| step.version)
}

/// Brings the catalog up to [`latest_version`] and returns how many steps ran.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let installed = schema_version(conn)?;
    let latest = latest_version();
    if installed > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: installed,
            latest_supported: latest,
        });
    }

    let pending: Vec<&CatalogMigration> = CATALOG_MIGRATIONS
        .iter()
        .filter(|step| step.version > installed)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} label={}",
            step.version, step.label
        );
    }
    tx.commit()?;
    Ok(pending.len())
}

/// Current `PRAGMA user_version` of the catalog.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        assert!(CATALOG_MIGRATIONS
            .windows(2)
            .all(|pair| pair[0].version < pair[1].version));
    }

    #[test]
    fn second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().expect("memory db");
        assert_eq!(apply_migrations(&mut conn).expect("first run"), CATALOG_MIGRATIONS.len());
        assert_eq!(apply_migrations(&mut conn).expect("second run"), 0);
        assert_eq!(schema_version(&conn).expect("version"), latest_version());
    }
}
