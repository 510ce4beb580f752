//! File primitives adapters call back into.
//!
//! # Invariants
//! - Every folder or file this module creates is pushed as a rollback step.
//! - Existing destinations are replaced only when overwrite is enabled.
//! - Stale-file deletion during updates is not reversible.

use super::{InstallError, InstallResult, Installer, PathKey, RollbackStep, UninstallReport};
use crate::fs::FsError;
use crate::manifest::ManifestNode;
use crate::model::extension::ClientId;
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    pub(crate) fn of(node: &ManifestNode) -> Self {
        if node.name == "folder" {
            Self::Folder
        } else {
            Self::File
        }
    }
}

/// One source-to-destination copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyEntry {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub kind: EntryKind,
}

impl CopyEntry {
    pub fn file(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            kind: EntryKind::File,
        }
    }

    pub fn folder(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            kind: EntryKind::Folder,
        }
    }
}

/// `(kind, relative path)` of every named child of a file list.
fn listed_entries(node: &ManifestNode) -> BTreeSet<(EntryKind, String)> {
    node.children
        .iter()
        .filter_map(|child| child.value().map(|value| (EntryKind::of(child), value.to_string())))
        .collect()
}

fn base_name(value: &str) -> &str {
    Path::new(value)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(value)
}

impl Installer<'_> {
    /// Creates `path` and records the top-most folder created.
    pub fn create_folder(&mut self, path: &Path) -> InstallResult<bool> {
        match self.ctx.fs.create_folder(path)? {
            Some(created) => {
                self.push_step(RollbackStep::FolderCreated(created));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copies each entry, refusing to replace existing destinations unless
    /// `overwrite` (or the installer's own flag when `None`) allows it.
    pub fn copy_files(&mut self, entries: &[CopyEntry], overwrite: Option<bool>) -> InstallResult<usize> {
        let overwrite = overwrite.unwrap_or(self.overwrite);
        let fs = self.ctx.fs;

        for entry in entries {
            if !fs.exists(&entry.src) {
                return Err(FsError::MissingSource(entry.src.clone()).into());
            }
            let existed = fs.exists(&entry.dest);
            if existed && !overwrite {
                return Err(InstallError::precondition(format!(
                    "destination already exists: {}",
                    entry.dest.display()
                )));
            }
            if let Some(parent) = entry.dest.parent() {
                self.create_folder(parent)?;
            }

            match entry.kind {
                EntryKind::File => fs.copy_file(&entry.src, &entry.dest, overwrite)?,
                EntryKind::Folder => fs.copy_folder(&entry.src, &entry.dest, overwrite)?,
            }
            if !existed {
                self.push_step(match entry.kind {
                    EntryKind::File => RollbackStep::FileCreated(entry.dest.clone()),
                    EntryKind::Folder => RollbackStep::FolderCreated(entry.dest.clone()),
                });
            }
        }
        Ok(entries.len())
    }

    /// Folder a file list for `client` lands in: the client-specific root
    /// when one is registered, the extension root otherwise.
    fn files_destination(&self, client: Option<ClientId>) -> PathBuf {
        let client_path = match client {
            Some(ClientId::Site) => self.path(PathKey::ExtensionSite),
            Some(ClientId::Administrator) => self.path(PathKey::ExtensionAdministrator),
            None => self.path(PathKey::ExtensionRoot),
        };
        if client_path.as_os_str().is_empty() {
            self.path(PathKey::ExtensionRoot).to_path_buf()
        } else {
            client_path.to_path_buf()
        }
    }

    /// Source folder for a list, honouring its `folder` attribute when that
    /// folder exists.
    fn list_source(&self, node: &ManifestNode) -> PathBuf {
        let source = self.path(PathKey::Source);
        match node.attr("folder").map(str::trim).filter(|folder| !folder.is_empty()) {
            Some(folder) if self.ctx.fs.exists(&source.join(folder)) => source.join(folder),
            _ => source.to_path_buf(),
        }
    }

    /// Copies a `<files>` list. With `old`, entries listed there but absent
    /// from `node` are deleted from the destination first.
    pub fn parse_files(
        &mut self,
        node: &ManifestNode,
        client: Option<ClientId>,
        old: Option<&ManifestNode>,
    ) -> InstallResult<usize> {
        let destination = self.files_destination(client);
        let source = self.list_source(node);

        if let Some(old) = old {
            let current = listed_entries(node);
            for (kind, stale) in listed_entries(old).difference(&current) {
                let path = destination.join(stale);
                debug!(
                    "event=stale_file_remove module=installer path={}",
                    path.display()
                );
                match kind {
                    EntryKind::Folder => self.ctx.fs.delete_folder(&path)?,
                    EntryKind::File => self.ctx.fs.delete_file(&path)?,
                }
            }
        }

        let entries: Vec<CopyEntry> = node
            .children
            .iter()
            .filter_map(|child| {
                child.value().map(|value| CopyEntry {
                    src: source.join(value),
                    dest: destination.join(value),
                    kind: EntryKind::of(child),
                })
            })
            .collect();
        self.copy_files(&entries, None)
    }

    /// Copies a `<media>` list into `<media>/<destination>`.
    pub fn parse_media(&mut self, node: &ManifestNode) -> InstallResult<usize> {
        let destination = self.media_destination(node);
        let source = self.list_source(node);
        let entries: Vec<CopyEntry> = node
            .children
            .iter()
            .filter_map(|child| {
                child.value().map(|value| CopyEntry {
                    src: source.join(value),
                    dest: destination.join(value),
                    kind: EntryKind::of(child),
                })
            })
            .collect();
        self.copy_files(&entries, None)
    }

    fn media_destination(&self, node: &ManifestNode) -> PathBuf {
        let media = &self.ctx.config.media;
        match node.attr("destination").map(str::trim).filter(|dest| !dest.is_empty()) {
            Some(dest) => media.join(dest),
            None => media.clone(),
        }
    }

    /// Copies `<language tag=..>` files into `<client>/language/<tag>/`.
    /// Tags without an installed language folder are skipped.
    pub fn parse_languages(&mut self, node: &ManifestNode, client: ClientId) -> InstallResult<usize> {
        let source = self.list_source(node);
        let language_root = self.ctx.config.client_root(client).join("language");
        let mut entries = Vec::new();

        for language in node.children_named("language") {
            let (Some(tag), Some(value)) = (language.attr("tag"), language.value()) else {
                continue;
            };
            let tag_dir = language_root.join(tag);
            if !self.ctx.fs.is_dir(&tag_dir) {
                debug!(
                    "event=language_skip module=installer tag={} client={}",
                    tag,
                    client.name()
                );
                continue;
            }
            entries.push(CopyEntry::file(source.join(value), tag_dir.join(base_name(value))));
        }
        self.copy_files(&entries, None)
    }

    /// Deletes what a `<files>`, `<media>` or `<languages>` list installed.
    pub fn remove_files(&self, node: &ManifestNode, client: Option<ClientId>, report: &mut UninstallReport) {
        let fs = self.ctx.fs;
        let targets: Vec<(EntryKind, PathBuf)> = match node.name.as_str() {
            "media" => {
                let root = self.media_destination(node);
                listed_entries(node)
                    .into_iter()
                    .map(|(kind, value)| (kind, root.join(value)))
                    .collect()
            }
            "languages" => {
                let language_root = self
                    .ctx
                    .config
                    .client_root(client.unwrap_or_default())
                    .join("language");
                node.children_named("language")
                    .filter_map(|language| {
                        let tag = language.attr("tag")?;
                        let value = language.value()?;
                        Some((EntryKind::File, language_root.join(tag).join(base_name(value))))
                    })
                    .collect()
            }
            _ => {
                let root = self.files_destination(client);
                listed_entries(node)
                    .into_iter()
                    .map(|(kind, value)| (kind, root.join(value)))
                    .collect()
            }
        };

        for (kind, path) in targets {
            let result = match kind {
                EntryKind::File => fs.delete_file(&path),
                EntryKind::Folder => fs.delete_folder(&path),
            };
            if let Err(err) = result {
                report.warn("remove_files", err);
            }
        }
    }

    /// Copies the manifest being installed to `dest` (always overwriting).
    pub fn copy_manifest(&mut self, dest: &Path) -> InstallResult<()> {
        let src = self.path(PathKey::Manifest).to_path_buf();
        if src == dest {
            return Ok(());
        }
        self.copy_files(&[CopyEntry::file(src, dest)], Some(true))?;
        Ok(())
    }

    /// Serialized descriptive metadata of the manifest being installed.
    pub fn generate_manifest_cache(&self) -> String {
        self.manifest
            .as_ref()
            .map(|manifest| manifest.manifest_cache())
            .unwrap_or_default()
    }

    /// Default parameters declared by the manifest being installed.
    pub fn get_params(&self) -> String {
        self.manifest
            .as_ref()
            .map(|manifest| manifest.params())
            .unwrap_or_else(|| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_entries_distinguish_files_and_folders() {
        let node = ManifestNode::new("files")
            .with_text_child("filename", "a.php")
            .with_text_child("folder", "tmpl")
            .with_text_child("filename", " ");
        let entries = listed_entries(&node);
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&(EntryKind::Folder, "tmpl".to_string())));
        assert!(entries.contains(&(EntryKind::File, "a.php".to_string())));
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("language/en-GB/en-GB.mod_hello.ini"), "en-GB.mod_hello.ini");
        assert_eq!(base_name("plain.ini"), "plain.ini");
    }
}
