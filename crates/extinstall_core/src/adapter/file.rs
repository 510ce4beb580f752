//! File-set adapter.
//!
//! # Responsibility
//! - Copy `fileset/files` lists into folders below the file root, each list
//!   relocated by its `target` attribute.
//! - Keep the manifest in the `files` side registry, since a file-set has no
//!   root folder of its own.

use super::{discovered_record, manifest_name, stored_manifests, AdapterState, KindAdapter};
use crate::installer::{CopyEntry, EntryKind, InstallError, InstallResult, Installer, PathKey, UninstallReport};
use crate::manifest::{clean_element, ManifestNode, ManifestView};
use crate::model::extension::{ExtensionRecord, ExtensionType};
use std::path::{Path, PathBuf};

const STORE: &str = "files";

pub struct FileAdapter {
    state: AdapterState,
}

impl FileAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::File),
        }
    }

    fn stored_manifest_path(&self, installer: &Installer<'_>) -> PathBuf {
        let ctx = installer.context();
        ctx.config
            .manifest_store(STORE)
            .join(ctx.manifest_file_name(&self.state.element))
    }

    /// Per-element folder in the side registry holding the `scriptfile`.
    fn script_folder(&self, installer: &Installer<'_>) -> PathBuf {
        installer.context().config.manifest_store(STORE).join(&self.state.element)
    }

    fn register_root(&self, installer: &mut Installer<'_>) {
        let root = installer.context().config.file_root().to_path_buf();
        installer.set_path(PathKey::ExtensionRoot, root);
    }
}

impl Default for FileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Folder a `files` list installs into.
fn target_dir(root: &Path, files: &ManifestNode) -> PathBuf {
    match files.attr("target").map(|target| target.trim().trim_matches('/')) {
        Some(target) if !target.is_empty() => root.join(target),
        _ => root.to_path_buf(),
    }
}

fn file_lists(manifest: &ManifestView) -> impl Iterator<Item = &ManifestNode> {
    manifest
        .node("fileset")
        .into_iter()
        .flat_map(|fileset| fileset.children_named("files"))
}

impl KindAdapter for FileAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.element = clean_element(&manifest.file_stem());
        if self.state.element.is_empty() {
            return Err(InstallError::precondition("file-set manifest file has no usable name"));
        }
        self.register_root(installer);
        Ok(())
    }

    fn occupied_paths(&self, installer: &Installer<'_>) -> Vec<PathBuf> {
        vec![self.stored_manifest_path(installer)]
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let root = installer.path(PathKey::ExtensionRoot).to_path_buf();
        let source_root = installer.path(PathKey::Source).to_path_buf();
        let fs = installer.context().fs;

        for files in file_lists(manifest) {
            let target = target_dir(&root, files);
            installer.create_folder(&target)?;

            let source = match files.attr("folder").map(str::trim).filter(|folder| !folder.is_empty()) {
                Some(folder) if fs.exists(&source_root.join(folder)) => source_root.join(folder),
                _ => source_root.clone(),
            };
            let entries: Vec<CopyEntry> = files
                .children
                .iter()
                .filter_map(|child| {
                    child.value().map(|value| CopyEntry {
                        src: source.join(value),
                        dest: target.join(value),
                        kind: EntryKind::of(child),
                    })
                })
                .collect();
            installer.copy_files(&entries, None)?;
        }
        Ok(())
    }

    fn script_destination(&self, installer: &Installer<'_>) -> Option<PathBuf> {
        Some(self.script_folder(installer))
    }

    fn default_record(&self, _installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::File, &self.state.element, &self.state.name);
        record.enabled = true;
        record.access = 0;
        record
    }

    fn manifest_destination(&self, installer: &Installer<'_>, _manifest: &ManifestView) -> PathBuf {
        self.stored_manifest_path(installer)
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        self.register_root(installer);
        Ok(())
    }

    fn installed_manifest_path(&self, installer: &Installer<'_>, _record: &ExtensionRecord) -> Option<PathBuf> {
        let path = self.stored_manifest_path(installer);
        installer.context().fs.exists(&path).then_some(path)
    }

    /// Deletes every listed entry below its target, then the script folder
    /// and stored manifest. The file root itself is never removed.
    fn remove_extension_files(
        &mut self,
        installer: &mut Installer<'_>,
        _record: &ExtensionRecord,
        manifest: Option<&ManifestView>,
        report: &mut UninstallReport,
    ) {
        let fs = installer.context().fs;
        let root = installer.path(PathKey::ExtensionRoot).to_path_buf();
        if let Some(manifest) = manifest {
            for files in file_lists(manifest) {
                let target = target_dir(&root, files);
                for child in &files.children {
                    let Some(value) = child.value() else {
                        continue;
                    };
                    let path = target.join(value);
                    let result = match EntryKind::of(child) {
                        EntryKind::Folder => fs.delete_folder(&path),
                        EntryKind::File => fs.delete_file(&path),
                    };
                    if let Err(err) = result {
                        report.warn("remove_files", err);
                    }
                }
            }
            if let Some(languages) = manifest.languages() {
                installer.remove_files(languages, None, report);
            }
        }
        if let Err(err) = fs.delete_folder(&self.script_folder(installer)) {
            report.warn("delete_script", err);
        }
        if let Err(err) = fs.delete_file(&self.stored_manifest_path(installer)) {
            report.warn("delete_manifest", err);
        }
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let store = installer.context().config.manifest_store(STORE);
        Ok(stored_manifests(installer, &store)?
            .into_iter()
            .filter_map(|(element, path)| discovered_record(installer, ExtensionType::File, &element, &path))
            .collect())
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.setup_uninstall(installer, record)?;
        Ok(self.stored_manifest_path(installer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_attribute_relocates_the_list() {
        let root = Path::new("/app/site");
        let plain = ManifestNode::new("files");
        let targeted = ManifestNode::new("files").with_attr("target", "/cli/");
        assert_eq!(target_dir(root, &plain), PathBuf::from("/app/site"));
        assert_eq!(target_dir(root, &targeted), PathBuf::from("/app/site/cli"));
    }
}
