//! Package adapter.
//!
//! # Responsibility
//! - Install every child artifact listed under `files/file` through its own
//!   `Installer`, collecting `{name, extension_id}` results for postflight.
//! - Uninstall children by resolving their current catalog id.
//!
//! # Invariants
//! - A child never shares the parent's rollback stack. The parent records
//!   one `ChildExtensionInstalled` step per freshly installed child.
//! - One failed child fails the whole package.
//! - A child that fails to uninstall keeps the package row and manifest.

use super::{discovered_record, manifest_name, stored_manifests, AdapterState, KindAdapter};
use crate::installer::{
    ChildResult, InstallError, InstallResult, InstallRoute, Installer, PathKey, RollbackStep, UninstallReport,
};
use crate::manifest::{clean_element, ManifestNode, ManifestView};
use crate::model::extension::{ClientId, ExtensionLookup, ExtensionRecord, ExtensionType};
use crate::repo::ExtensionRepository;
use log::{info, warn};
use std::path::PathBuf;

const STORE: &str = "packages";
const PREFIX: &str = "pkg_";

pub struct PackageAdapter {
    state: AdapterState,
}

impl PackageAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Package),
        }
    }

    fn stored_manifest_path(&self, installer: &Installer<'_>) -> PathBuf {
        let ctx = installer.context();
        ctx.config
            .manifest_store(STORE)
            .join(ctx.manifest_file_name(&self.state.element))
    }

    /// Per-package folder in the side registry holding the `scriptfile`.
    fn script_folder(&self, installer: &Installer<'_>) -> PathBuf {
        installer.context().config.manifest_store(STORE).join(&self.state.element)
    }

    fn register_root(&self, installer: &mut Installer<'_>) {
        let store = installer.context().config.manifest_store(STORE);
        installer.set_path(PathKey::ExtensionRoot, store);
    }

    /// Runs one child through a fresh installer using the package's route.
    fn install_child(&mut self, installer: &mut Installer<'_>, entry: &str, path: PathBuf) -> InstallResult<()> {
        let mut child = Installer::new(installer.context());
        child.set_overwrite(installer.overwrite());
        let result = if self.state.route == InstallRoute::Update {
            child.update(&path)
        } else {
            child.install(&path)
        };
        let id = result.map_err(|source| InstallError::ChildInstall {
            child: entry.to_string(),
            source: Box::new(source),
        })?;

        let name = child
            .manifest()
            .and_then(|manifest| manifest.name().ok())
            .unwrap_or(entry)
            .to_string();
        if child.route() == Some(InstallRoute::Install) {
            if let Some(kind) = child.manifest().map(ManifestView::kind) {
                installer.push_step(RollbackStep::ChildExtensionInstalled { kind, id });
            }
        }
        info!(
            "event=package_child module=adapter status=ok package={} child={} extension_id={}",
            self.state.element, entry, id
        );
        self.state.results.push(ChildResult { name, extension_id: id });
        Ok(())
    }
}

impl Default for PackageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn package_element(manifest: &ManifestView) -> InstallResult<String> {
    let name = manifest
        .value("packagename")
        .map(clean_element)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| InstallError::precondition("package manifest has no packagename"))?;
    Ok(if name.starts_with(PREFIX) {
        name
    } else {
        format!("{PREFIX}{name}")
    })
}

/// Catalog lookup for one `files/file[type,id,client,group]` entry.
fn child_lookup(entry: &ManifestNode) -> Option<ExtensionLookup> {
    let kind = ExtensionType::parse(entry.attr("type")?)?;
    let element = clean_element(entry.attr("id")?);
    let client = entry.attr("client").and_then(ClientId::from_name);
    Some(ExtensionLookup::for_kind(kind, &element, entry.attr("group"), client))
}

impl KindAdapter for PackageAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.element = package_element(manifest)?;
        self.register_root(installer);
        Ok(())
    }

    fn occupied_paths(&self, installer: &Installer<'_>) -> Vec<PathBuf> {
        vec![self.stored_manifest_path(installer)]
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let Some(files) = manifest.files() else {
            return Err(InstallError::precondition("package manifest lists no files"));
        };
        let source = installer.path(PathKey::Source).to_path_buf();
        let source = match files.attr("folder").map(str::trim).filter(|folder| !folder.is_empty()) {
            Some(folder) => source.join(folder),
            None => source,
        };

        for entry in files.children_named("file") {
            let Some(value) = entry.value() else {
                continue;
            };
            let path = source.join(value);
            if !installer.context().fs.exists(&path) {
                return Err(InstallError::precondition(format!(
                    "package child not found: {}",
                    path.display()
                )));
            }
            self.install_child(installer, value, path)?;
        }
        Ok(())
    }

    fn script_destination(&self, installer: &Installer<'_>) -> Option<PathBuf> {
        Some(self.script_folder(installer))
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Package, &self.state.element, &self.state.name);
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
        self.register_root(installer);
        Ok(())
    }

    fn installed_manifest_path(&self, installer: &Installer<'_>, _record: &ExtensionRecord) -> Option<PathBuf> {
        let path = self.stored_manifest_path(installer);
        installer.context().fs.exists(&path).then_some(path)
    }

    /// Uninstalls each listed child. Children missing from the catalog are
    /// skipped; children that fail keep the package registered.
    fn remove_auxiliary(&mut self, installer: &mut Installer<'_>, _record: &ExtensionRecord, report: &mut UninstallReport) {
        let Some(files) = installer.manifest().and_then(ManifestView::files).cloned() else {
            return;
        };
        let ctx = installer.context();
        for entry in files.children_named("file") {
            let Some(lookup) = child_lookup(entry) else {
                report.warn("child_lookup", format!("unresolvable entry `{}`", entry.text.trim()));
                continue;
            };
            let id = match ctx.catalog().extensions.find(&lookup) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    warn!(
                        "event=package_child module=adapter status=skipped package={} type={} element={}",
                        self.state.element, lookup.kind, lookup.element
                    );
                    continue;
                }
                Err(err) => {
                    report.warn("child_lookup", err);
                    continue;
                }
            };

            let mut child = Installer::new(ctx);
            match child.uninstall(lookup.kind, id) {
                Ok(child_report) if !child_report.is_clean() => report.warn(
                    "child_uninstall",
                    format!("{} `{}` left {} warnings", lookup.kind, lookup.element, child_report.warnings.len()),
                ),
                Ok(_) => {}
                Err(err) => {
                    report.warn("child_uninstall", format!("{} `{}`: {err}", lookup.kind, lookup.element));
                    report.record_retained = true;
                }
            }
        }
    }

    fn remove_extension_files(
        &mut self,
        installer: &mut Installer<'_>,
        _record: &ExtensionRecord,
        manifest: Option<&ManifestView>,
        report: &mut UninstallReport,
    ) {
        if report.record_retained {
            return;
        }
        if let Some(languages) = manifest.and_then(ManifestView::languages) {
            installer.remove_files(languages, None, report);
        }
        let fs = installer.context().fs;
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
            .filter_map(|(element, path)| discovered_record(installer, ExtensionType::Package, &element, &path))
            .collect())
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.setup_uninstall(installer, record)?;
        Ok(self.stored_manifest_path(installer))
    }
}
