//! Library adapter.
//!
//! Libraries install into `<libraries>/<libraryname>`; the catalog element is
//! the manifest file stem and the manifest itself is kept in the
//! `libraries` side registry.

use super::{discovered_record, load_manifest, manifest_name, stored_manifests, AdapterState, KindAdapter};
use crate::installer::{InstallError, InstallResult, InstallRoute, Installer, PathKey, UninstallReport};
use crate::manifest::{clean_element, ManifestView};
use crate::model::extension::{ExtensionRecord, ExtensionType};
use std::path::PathBuf;

const STORE: &str = "libraries";

pub struct LibraryAdapter {
    state: AdapterState,
}

impl LibraryAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Library),
        }
    }

    fn stored_manifest_path(&self, installer: &Installer<'_>) -> PathBuf {
        let ctx = installer.context();
        ctx.config
            .manifest_store(STORE)
            .join(ctx.manifest_file_name(&self.state.element))
    }

    fn register_root(&self, installer: &mut Installer<'_>, library_name: &str) {
        let root = installer.context().config.libraries.join(library_name);
        installer.set_path(PathKey::ExtensionRoot, root);
    }
}

impl Default for LibraryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn library_name(manifest: &ManifestView) -> InstallResult<String> {
    manifest
        .value("libraryname")
        .map(|name| name.trim_matches('/').to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| InstallError::precondition("library manifest has no libraryname"))
}

impl KindAdapter for LibraryAdapter {
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
            return Err(InstallError::precondition("library manifest file has no usable name"));
        }
        let library = library_name(manifest)?;
        self.register_root(installer, &library);
        Ok(())
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let Some(files) = manifest.files() else {
            return Ok(());
        };
        let old = if self.state.route == InstallRoute::Update {
            load_manifest(installer, &self.stored_manifest_path(installer))
        } else {
            None
        };
        installer.parse_files(files, None, old.as_ref().and_then(ManifestView::files))?;
        Ok(())
    }

    /// Library folders may be shared with site files, so no script copy is kept.
    fn script_destination(&self, _installer: &Installer<'_>) -> Option<PathBuf> {
        None
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Library, &self.state.element, &self.state.name);
        record.enabled = true;
        record.access = 1;
        record.params = installer.get_params();
        record
    }

    fn manifest_destination(&self, installer: &Installer<'_>, _manifest: &ManifestView) -> PathBuf {
        self.stored_manifest_path(installer)
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        let library = load_manifest(installer, &self.stored_manifest_path(installer))
            .and_then(|manifest| library_name(&manifest).ok())
            .unwrap_or_else(|| record.element.clone());
        self.register_root(installer, &library);
        Ok(())
    }

    fn installed_manifest_path(&self, installer: &Installer<'_>, _record: &ExtensionRecord) -> Option<PathBuf> {
        let path = self.stored_manifest_path(installer);
        installer.context().fs.exists(&path).then_some(path)
    }

    /// Removes listed files and the stored manifest. The library folder goes
    /// only once nothing else is left in it.
    fn remove_extension_files(
        &mut self,
        installer: &mut Installer<'_>,
        _record: &ExtensionRecord,
        manifest: Option<&ManifestView>,
        report: &mut UninstallReport,
    ) {
        if let Some(manifest) = manifest {
            for node in [manifest.files(), manifest.media(), manifest.languages()].into_iter().flatten() {
                installer.remove_files(node, None, report);
            }
        }

        let fs = installer.context().fs;
        if let Err(err) = fs.delete_file(&self.stored_manifest_path(installer)) {
            report.warn("delete_manifest", err);
        }
        let root = installer.path(PathKey::ExtensionRoot);
        let empty = matches!(
            (fs.folders(root), fs.files(root)),
            (Ok(folders), Ok(files)) if folders.is_empty() && files.is_empty()
        );
        if empty {
            if let Err(err) = fs.delete_folder(root) {
                report.warn("delete_root", err);
            }
        }
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let store = installer.context().config.manifest_store(STORE);
        Ok(stored_manifests(installer, &store)?
            .into_iter()
            .filter_map(|(element, path)| discovered_record(installer, ExtensionType::Library, &element, &path))
            .collect())
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.setup_uninstall(installer, record)?;
        Ok(self.stored_manifest_path(installer))
    }
}
