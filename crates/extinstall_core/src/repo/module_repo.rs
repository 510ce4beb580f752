//! Module instance rows and their menu assignments.

use super::{bool_to_int, RepoResult};
use crate::model::catalog::ModuleInstance;
use crate::model::extension::ClientId;
use rusqlite::{params, Connection};

#[derive(Clone, Copy)]
pub struct ModuleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ModuleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, instance: &ModuleInstance) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO modules (
                title,
                content,
                module,
                position,
                published,
                access,
                showtitle,
                params,
                client_id,
                language
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                instance.title.as_str(),
                instance.content.as_str(),
                instance.module.as_str(),
                instance.position.as_str(),
                bool_to_int(instance.published),
                instance.access,
                bool_to_int(instance.showtitle),
                instance.params.as_str(),
                instance.client_id.as_i64(),
                instance.language.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_for_module(&self, module: &str, client_id: ClientId) -> RepoResult<Vec<ModuleInstance>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, module, position, published, access, showtitle, params, language
            FROM modules
            WHERE module = ?1 AND client_id = ?2
            ORDER BY id ASC;",
        )?;
        let instances = stmt
            .query_map(params![module, client_id.as_i64()], |row| {
                Ok(ModuleInstance {
                    id: Some(row.get(0)?),
                    title: row.get(1)?,
                    content: row.get(2)?,
                    module: row.get(3)?,
                    position: row.get(4)?,
                    published: row.get::<_, i64>(5)? != 0,
                    access: row.get(6)?,
                    showtitle: row.get::<_, i64>(7)? != 0,
                    params: row.get(8)?,
                    client_id,
                    language: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(instances)
    }

    pub fn assign_menu(&self, module_id: i64, menu_id: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO modules_menu (moduleid, menuid) VALUES (?1, ?2);",
            params![module_id, menu_id],
        )?;
        Ok(())
    }

    pub fn count_menu_assignments(&self, module_id: i64) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM modules_menu WHERE moduleid = ?1;",
            [module_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Deletes one instance together with its menu assignments.
    pub fn delete(&self, id: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM modules_menu WHERE moduleid = ?1;", [id])?;
        self.conn.execute("DELETE FROM modules WHERE id = ?1;", [id])?;
        Ok(())
    }

    /// Deletes every instance of `module` for one client.
    pub fn delete_for_module(&self, module: &str, client_id: ClientId) -> RepoResult<usize> {
        self.conn.execute(
            "DELETE FROM modules_menu WHERE moduleid IN (
                SELECT id FROM modules WHERE module = ?1 AND client_id = ?2
            );",
            params![module, client_id.as_i64()],
        )?;
        let deleted = self.conn.execute(
            "DELETE FROM modules WHERE module = ?1 AND client_id = ?2;",
            params![module, client_id.as_i64()],
        )?;
        Ok(deleted)
    }
}
