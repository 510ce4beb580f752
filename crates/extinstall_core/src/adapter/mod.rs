//! Per-kind extension adapters.
//!
//! # Responsibility
//! - Hold the kind-specific knowledge of path layout, catalog defaults and
//!   auxiliary rows behind one `KindAdapter` capability trait.
//! - Leave the phase order to the shared lifecycle in `installer`.
//!
//! # Invariants
//! - Adapters never unwind their own side effects; they push rollback steps
//!   through the `Installer` and return `Err`.
//! - One adapter instance serves exactly one operation.

use crate::installer::{
    ChildResult, InstallError, InstallResult, InstallRoute, Installer, InstallerScript, PathKey,
    RollbackStep, UninstallReport,
};
use crate::manifest::{find_manifest, read_manifest, ManifestView};
use crate::model::extension::{
    ClientId, ExtensionId, ExtensionLookup, ExtensionRecord, ExtensionType, STATE_DISCOVERED,
};
use crate::repo::ExtensionRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod component;
mod file;
mod library;
mod module;
mod package;
mod plugin;
mod template;

pub use component::ComponentAdapter;
pub use file::FileAdapter;
pub use library::LibraryAdapter;
pub use module::ModuleAdapter;
pub use package::PackageAdapter;
pub use plugin::PluginAdapter;
pub use template::TemplateAdapter;

/// State every adapter carries through one operation.
pub struct AdapterState {
    pub kind: ExtensionType,
    pub route: InstallRoute,
    pub element: String,
    pub name: String,
    /// Plugin group; empty for other kinds.
    pub folder: String,
    pub client: ClientId,
    /// Catalog row matching this extension before the run started.
    pub current_extension_id: Option<ExtensionId>,
    pub record: Option<ExtensionRecord>,
    pub script: Option<Arc<dyn InstallerScript>>,
    /// Children installed by a package.
    pub results: Vec<ChildResult>,
}

impl AdapterState {
    pub fn new(kind: ExtensionType) -> Self {
        Self {
            kind,
            route: InstallRoute::Install,
            element: String::new(),
            name: String::new(),
            folder: String::new(),
            client: ClientId::Site,
            current_extension_id: None,
            record: None,
            script: None,
            results: Vec::new(),
        }
    }

    /// Copies identity fields from a stored record.
    pub(crate) fn adopt(&mut self, record: &ExtensionRecord) {
        self.element = record.element.clone();
        self.name = record.name.clone();
        self.folder = record.folder.clone();
        self.client = record.client_id;
        self.current_extension_id = record.extension_id;
    }
}

/// Builds the adapter for `kind`.
pub fn for_kind(kind: ExtensionType) -> Box<dyn KindAdapter> {
    match kind {
        ExtensionType::Component => Box::new(ComponentAdapter::new()),
        ExtensionType::Module => Box::new(ModuleAdapter::new()),
        ExtensionType::Plugin => Box::new(PluginAdapter::new()),
        ExtensionType::Template => Box::new(TemplateAdapter::new()),
        ExtensionType::Library => Box::new(LibraryAdapter::new()),
        ExtensionType::File => Box::new(FileAdapter::new()),
        ExtensionType::Package => Box::new(PackageAdapter::new()),
    }
}

/// Capability interface one extension kind plugs into the shared lifecycle.
///
/// Only `setup_install_paths`, `copy_base_files`, `default_record`,
/// `setup_uninstall`, `discover` and `prepare_discover_install` are
/// mandatory; every other step has the behaviour most kinds share.
pub trait KindAdapter {
    fn state(&self) -> &AdapterState;
    fn state_mut(&mut self) -> &mut AdapterState;

    fn kind(&self) -> ExtensionType {
        self.state().kind
    }

    /// Resolves element, name and client from the manifest and registers the
    /// folders this extension occupies.
    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()>;

    /// Catalog fields identifying this extension.
    fn lookup(&self) -> ExtensionLookup {
        let state = self.state();
        ExtensionLookup::for_kind(
            self.kind(),
            &state.element,
            Some(state.folder.as_str()),
            Some(state.client),
        )
    }

    fn check_existing_extension(&mut self, installer: &mut Installer<'_>) -> InstallResult<()> {
        let lookup = self.lookup();
        let id = installer.context().catalog().extensions.find(&lookup)?;
        self.state_mut().current_extension_id = id;
        Ok(())
    }

    /// Paths whose presence means the target is already occupied.
    fn occupied_paths(&self, installer: &Installer<'_>) -> Vec<PathBuf> {
        vec![installer.path(PathKey::ExtensionRoot).to_path_buf()]
    }

    /// Switches to `update` when the target is occupied by a known extension
    /// and an update mechanism (upgrade flag, script `update`, `<update>` tag)
    /// or overwrite is available; fails when none is.
    fn check_extension_in_filesystem(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let fs = installer.context().fs;
        let Some(occupied) = self
            .occupied_paths(installer)
            .into_iter()
            .find(|path| fs.exists(path))
        else {
            return Ok(());
        };

        let state = self.state();
        let update_mechanism = installer.upgrade()
            || state.script.as_ref().is_some_and(|script| script.supports_update())
            || manifest.has_update();
        if !update_mechanism && !installer.overwrite() {
            return Err(InstallError::precondition(format!(
                "directory already in use: {}",
                occupied.display()
            )));
        }
        installer.set_overwrite(true);
        if state.current_extension_id.is_some() {
            self.state_mut().route = InstallRoute::Update;
        }
        Ok(())
    }

    /// Registry key of this extension's custom script.
    fn script_key(&self) -> String {
        crate::installer::script::script_key(self.kind(), &self.state().element, None)
    }

    fn create_extension_root(&mut self, installer: &mut Installer<'_>) -> InstallResult<()> {
        let root = installer.path(PathKey::ExtensionRoot).to_path_buf();
        installer.create_folder(&root)?;
        Ok(())
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()>;

    /// Folder the manifest's `scriptfile` is copied into, or `None` when
    /// this kind keeps no copy of it.
    fn script_destination(&self, installer: &Installer<'_>) -> Option<PathBuf> {
        Some(installer.path(PathKey::ExtensionRoot).to_path_buf())
    }

    fn parse_optional_tags(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        if let Some(media) = manifest.media() {
            installer.parse_media(media)?;
        }
        if let Some(languages) = manifest.languages() {
            installer.parse_languages(languages, self.state().client)?;
        }
        Ok(())
    }

    /// Fields of a freshly inserted catalog row.
    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord;

    /// Updates the existing row (name and manifest cache) or inserts a new
    /// one with this kind's defaults.
    fn store_extension(&mut self, installer: &mut Installer<'_>) -> InstallResult<ExtensionId> {
        let extensions = installer.context().catalog().extensions;
        let manifest_cache = installer.generate_manifest_cache();

        if let Some(id) = self.state().current_extension_id {
            if !installer.overwrite() && self.state().route != InstallRoute::Update {
                return Err(InstallError::precondition(format!(
                    "{} `{}` is already installed",
                    self.kind(),
                    self.state().element
                )));
            }
            let mut record = extensions.load(id)?;
            record.name = self.state().name.clone();
            record.manifest_cache = manifest_cache;
            extensions.store(&mut record)?;
            self.state_mut().record = Some(record);
            return Ok(id);
        }

        let mut record = self.default_record(installer);
        record.manifest_cache = manifest_cache;
        let id = extensions.store(&mut record)?;
        installer.push_step(RollbackStep::ExtensionRowCreated(id));
        self.state_mut().record = Some(record);
        self.after_insert(installer, id)?;
        Ok(id)
    }

    /// Auxiliary rows created alongside a new catalog row.
    fn after_insert(&mut self, _installer: &mut Installer<'_>, _id: ExtensionId) -> InstallResult<()> {
        Ok(())
    }

    /// Where the installed manifest is kept.
    fn manifest_destination(&self, installer: &Installer<'_>, manifest: &ManifestView) -> PathBuf {
        installer.path(PathKey::ExtensionRoot).join(manifest.file_name())
    }

    /// Clears pending-update markers satisfied by this install.
    fn finalise_install(&mut self, installer: &mut Installer<'_>, _manifest: &ManifestView) -> InstallResult<()> {
        clear_pending_marker(installer, self.state())
    }

    /// Registers paths and identity for removing `record`.
    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()>;

    /// Kind-specific reasons to refuse removal.
    fn refuse_uninstall(&self, _installer: &Installer<'_>, _record: &ExtensionRecord) -> InstallResult<()> {
        Ok(())
    }

    /// Location of the manifest kept for an installed extension.
    fn installed_manifest_path(&self, installer: &Installer<'_>, _record: &ExtensionRecord) -> Option<PathBuf> {
        let ctx = installer.context();
        find_manifest(ctx.fs, ctx.reader, installer.path(PathKey::ExtensionRoot))
            .ok()
            .map(|(path, _)| path)
    }

    fn remove_auxiliary(&mut self, _installer: &mut Installer<'_>, _record: &ExtensionRecord, _report: &mut UninstallReport) {}

    /// Deletes media, language files and the extension root.
    fn remove_extension_files(
        &mut self,
        installer: &mut Installer<'_>,
        record: &ExtensionRecord,
        manifest: Option<&ManifestView>,
        report: &mut UninstallReport,
    ) {
        if let Some(manifest) = manifest {
            if let Some(media) = manifest.media() {
                installer.remove_files(media, None, report);
            }
            if let Some(languages) = manifest.languages() {
                installer.remove_files(languages, Some(record.client_id), report);
            }
        }
        let root = installer.path(PathKey::ExtensionRoot).to_path_buf();
        if let Err(err) = installer.context().fs.delete_folder(&root) {
            report.warn("delete_root", err);
        }
    }

    /// Unregistered extensions of this kind present on disk.
    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>>;

    /// Registers paths for a pending record and returns its manifest path.
    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf>;

    fn finalise_discover_install(&mut self, _installer: &mut Installer<'_>, _manifest: &ManifestView) -> InstallResult<()> {
        Ok(())
    }
}

/// Removes pending-update markers for the extension in `state`.
pub(crate) fn clear_pending_marker(installer: &Installer<'_>, state: &AdapterState) -> InstallResult<()> {
    installer.context().catalog().markers.clear_pending_updates(
        state.kind,
        &state.element,
        state.client,
        &state.folder,
    )?;
    Ok(())
}

/// Manifests kept in a side-registry folder, keyed by file stem.
pub(crate) fn stored_manifests(installer: &Installer<'_>, store: &Path) -> InstallResult<Vec<(String, PathBuf)>> {
    let ctx = installer.context();
    let suffix = format!(".{}", ctx.reader.extension());
    Ok(ctx
        .fs
        .files(store)?
        .into_iter()
        .filter_map(|file| {
            let stem = file.strip_suffix(&suffix)?.to_string();
            Some((stem, store.join(&file)))
        })
        .collect())
}

/// Reads the manifest at `path` when it exists and is well formed.
pub(crate) fn load_manifest(installer: &Installer<'_>, path: &Path) -> Option<ManifestView> {
    let ctx = installer.context();
    if !ctx.fs.exists(path) {
        return None;
    }
    let root = read_manifest(ctx.fs, ctx.reader, path).ok()?;
    ManifestView::new(root, path).ok()
}

/// Pending record for a manifest found on disk.
pub(crate) fn discovered_record(
    installer: &Installer<'_>,
    kind: ExtensionType,
    element: &str,
    manifest_path: &Path,
) -> Option<ExtensionRecord> {
    let manifest = load_manifest(installer, manifest_path)?;
    if manifest.kind() != kind {
        return None;
    }
    let mut record = ExtensionRecord::new(kind, element, manifest.name().unwrap_or(element));
    record.manifest_cache = manifest.manifest_cache();
    record.state = STATE_DISCOVERED;
    Some(record)
}

/// Display name from the manifest's `<name>`.
pub(crate) fn manifest_name(manifest: &ManifestView) -> InstallResult<String> {
    Ok(manifest.name()?.to_string())
}

/// Manifest files in `dir` named after their folder, e.g. `<dir>/<x>/<x>.json`.
pub(crate) fn folder_manifests(installer: &Installer<'_>, dir: &Path) -> InstallResult<Vec<(String, PathBuf)>> {
    let ctx = installer.context();
    let mut found = Vec::new();
    for folder in ctx.fs.folders(dir)? {
        let path = dir.join(&folder).join(ctx.manifest_file_name(&folder));
        if ctx.fs.exists(&path) {
            found.push((folder, path));
        }
    }
    Ok(found)
}
