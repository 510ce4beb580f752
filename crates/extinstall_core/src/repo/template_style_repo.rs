//! Template style rows.

use super::{bool_to_int, RepoResult};
use crate::model::catalog::TemplateStyle;
use crate::model::extension::ClientId;
use rusqlite::{params, Connection};

#[derive(Clone, Copy)]
pub struct TemplateStyleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TemplateStyleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, style: &TemplateStyle) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO template_styles (template, client_id, home, title, params)
            VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                style.template.as_str(),
                style.client_id.as_i64(),
                bool_to_int(style.home),
                style.title.as_str(),
                style.params.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_for_template(&self, template: &str, client_id: ClientId) -> RepoResult<Vec<TemplateStyle>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, template, home, title, params
            FROM template_styles
            WHERE template = ?1 AND client_id = ?2
            ORDER BY id ASC;",
        )?;
        let styles = stmt
            .query_map(params![template, client_id.as_i64()], |row| {
                Ok(TemplateStyle {
                    id: Some(row.get(0)?),
                    template: row.get(1)?,
                    client_id,
                    home: row.get::<_, i64>(2)? != 0,
                    title: row.get(3)?,
                    params: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(styles)
    }

    /// Marks one style as its client's default and clears the flag on the others.
    pub fn set_home(&self, id: i64, client_id: ClientId) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE template_styles SET home = CASE WHEN id = ?1 THEN 1 ELSE 0 END
            WHERE client_id = ?2;",
            params![id, client_id.as_i64()],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM template_styles WHERE id = ?1;", [id])?;
        Ok(())
    }

    pub fn delete_for_template(&self, template: &str, client_id: ClientId) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM template_styles WHERE template = ?1 AND client_id = ?2;",
            params![template, client_id.as_i64()],
        )?;
        Ok(deleted)
    }
}
