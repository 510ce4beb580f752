//! Install/uninstall SQL and schema-version bookkeeping.
//!
//! # Invariants
//! - Only `<file driver=..>` entries matching the configured driver (or
//!   carrying no driver) are executed.
//! - The recorded schema version is the highest schema file applied.

use super::{InstallResult, Installer, PathKey};
use crate::fs::FsError;
use crate::manifest::ManifestNode;
use crate::model::extension::ExtensionId;
use log::info;
use std::cmp::Ordering;
use std::path::PathBuf;

const SCHEMA_FILE_SUFFIX: &str = ".sql";
const INITIAL_SCHEMA_VERSION: &str = "0.0.0";

/// Compares dotted version strings part by part; numeric parts compare
/// numerically, missing parts count as zero.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left_parts: Vec<&str> = left.trim().split('.').collect();
    let right_parts: Vec<&str> = right.trim().split('.').collect();
    let len = left_parts.len().max(right_parts.len());

    for index in 0..len {
        let l = left_parts.get(index).copied().unwrap_or("0");
        let r = right_parts.get(index).copied().unwrap_or("0");
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl Installer<'_> {
    fn driver_matches(&self, node: &ManifestNode) -> bool {
        match node.attr("driver").map(str::trim).filter(|driver| !driver.is_empty()) {
            Some(driver) => driver.eq_ignore_ascii_case(&self.ctx.config.database_driver),
            None => true,
        }
    }

    /// Folder SQL paths are relative to: the administrator folder when one is
    /// registered, the extension root otherwise.
    fn sql_root(&self) -> PathBuf {
        let admin = self.path(PathKey::ExtensionAdministrator);
        if admin.as_os_str().is_empty() {
            self.path(PathKey::ExtensionRoot).to_path_buf()
        } else {
            admin.to_path_buf()
        }
    }

    fn resolve_sql_path(&self, relative: &str) -> InstallResult<PathBuf> {
        let installed = self.sql_root().join(relative);
        if self.ctx.fs.exists(&installed) {
            return Ok(installed);
        }
        let source = self.path(PathKey::Source).join(relative);
        if self.ctx.fs.exists(&source) {
            return Ok(source);
        }
        Err(FsError::MissingSource(installed).into())
    }

    /// Executes every matching `<file>` of an `<sql>` node. Returns the
    /// number of files run.
    pub fn parse_sql_files(&self, sql: Option<&ManifestNode>) -> InstallResult<usize> {
        let Some(sql) = sql else {
            return Ok(0);
        };
        let mut executed = 0;
        for file in sql.children_named("file") {
            if !self.driver_matches(file) {
                continue;
            }
            let Some(relative) = file.value() else {
                continue;
            };
            let path = self.resolve_sql_path(relative)?;
            let statements = self.ctx.fs.read_to_string(&path)?;
            self.ctx.conn.execute_batch(&statements)?;
            executed += 1;
        }
        Ok(executed)
    }

    fn schema_dir(&self, schemas: &ManifestNode) -> Option<PathBuf> {
        let relative = schemas
            .children_named("schemapath")
            .find(|path| {
                path.attr("type")
                    .is_some_and(|kind| kind.eq_ignore_ascii_case(&self.ctx.config.database_driver))
            })
            .and_then(ManifestNode::value)?;
        let installed = self.sql_root().join(relative);
        if self.ctx.fs.is_dir(&installed) {
            return Some(installed);
        }
        let source = self.path(PathKey::Source).join(relative);
        self.ctx.fs.is_dir(&source).then_some(source)
    }

    /// `(version, path)` of every schema file, oldest first.
    fn schema_files(&self, schemas: &ManifestNode) -> InstallResult<Vec<(String, PathBuf)>> {
        let Some(dir) = self.schema_dir(schemas) else {
            return Ok(Vec::new());
        };
        let mut files: Vec<(String, PathBuf)> = self
            .ctx
            .fs
            .files(&dir)?
            .into_iter()
            .filter_map(|name| {
                let version = name.strip_suffix(SCHEMA_FILE_SUFFIX)?.to_string();
                Some((version, dir.join(&name)))
            })
            .collect();
        files.sort_by(|(left, _), (right, _)| compare_versions(left, right));
        Ok(files)
    }

    /// Records the newest schema file's version without running it.
    pub fn set_schema_version(&self, schemas: Option<&ManifestNode>, id: ExtensionId) -> InstallResult<()> {
        let Some(schemas) = schemas else {
            return Ok(());
        };
        let markers = self.ctx.catalog().markers;
        markers.clear_schema_version(id)?;
        if let Some((version, _)) = self.schema_files(schemas)?.last() {
            markers.set_schema_version(id, version)?;
        }
        Ok(())
    }

    /// Runs every schema file newer than the recorded version, in order, and
    /// records the last one applied. Returns the number of files run.
    pub fn parse_schema_updates(&self, schemas: Option<&ManifestNode>, id: ExtensionId) -> InstallResult<usize> {
        let Some(schemas) = schemas else {
            return Ok(0);
        };
        let markers = self.ctx.catalog().markers;
        let current = markers
            .schema_version(id)?
            .unwrap_or_else(|| INITIAL_SCHEMA_VERSION.to_string());

        let mut applied = None;
        let mut count = 0;
        for (version, path) in self.schema_files(schemas)? {
            if compare_versions(&version, &current) != Ordering::Greater {
                continue;
            }
            let statements = self.ctx.fs.read_to_string(&path)?;
            self.ctx.conn.execute_batch(&statements)?;
            info!(
                "event=schema_update module=installer status=ok extension_id={} version={}",
                id, version
            );
            applied = Some(version);
            count += 1;
        }

        if let Some(version) = applied {
            markers.set_schema_version(id, &version)?;
        }
        Ok(count)
    }
}
