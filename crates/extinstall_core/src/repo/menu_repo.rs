//! Administrative menu rows registered by components.

use super::{bool_to_int, RepoResult};
use crate::model::catalog::MenuItem;
use crate::model::extension::{ClientId, ExtensionId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

#[derive(Clone, Copy)]
pub struct MenuRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> MenuRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, item: &MenuItem) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO menu (
                menutype,
                title,
                alias,
                link,
                type,
                published,
                parent_id,
                component_id,
                client_id,
                img,
                home,
                template_style_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                item.menutype.as_str(),
                item.title.as_str(),
                item.alias.as_str(),
                item.link.as_str(),
                item.item_type.as_str(),
                bool_to_int(item.published),
                item.parent_id,
                item.component_id,
                item.client_id.as_i64(),
                item.img.as_str(),
                bool_to_int(item.home),
                item.template_style_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Admin menu titles of a component, ordered by id.
    pub fn titles_for_component(&self, component_id: ExtensionId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT title FROM menu
            WHERE component_id = ?1 AND client_id = ?2
            ORDER BY id ASC;",
        )?;
        let titles = stmt
            .query_map(
                params![component_id, ClientId::Administrator.as_i64()],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(titles)
    }

    /// Deletes every admin menu row of a component.
    pub fn delete_for_component(&self, component_id: ExtensionId) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM menu WHERE component_id = ?1 AND client_id = ?2;",
            params![component_id, ClientId::Administrator.as_i64()],
        )?;
        Ok(deleted)
    }

    /// Points menu items using any of `style_ids` back at the default style.
    pub fn reset_template_styles(&self, style_ids: &[i64]) -> RepoResult<usize> {
        if style_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; style_ids.len()].join(", ");
        let sql = format!(
            "UPDATE menu SET template_style_id = 0 WHERE template_style_id IN ({placeholders});"
        );
        let values = style_ids.iter().map(|id| Value::Integer(*id));
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }
}
