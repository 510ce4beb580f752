//! Plugin adapter.
//!
//! # Invariants
//! - A plugin lives at `<plugins>/<group>/<element>` and is unique per
//!   `(element, group)`.
//! - Only plugins of the `editors` group are enabled on install.

use super::{discovered_record, manifest_name, AdapterState, KindAdapter};
use crate::installer::script::script_key;
use crate::installer::{InstallError, InstallResult, InstallRoute, Installer, PathKey};
use crate::manifest::{clean_element, find_manifest, ManifestView};
use crate::model::extension::{ExtensionRecord, ExtensionType};
use std::path::PathBuf;

const AUTO_ENABLED_GROUP: &str = "editors";

pub struct PluginAdapter {
    state: AdapterState,
}

impl PluginAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Plugin),
        }
    }

    fn register_root(&self, installer: &mut Installer<'_>) {
        let root = installer
            .context()
            .config
            .plugins
            .join(&self.state.folder)
            .join(&self.state.element);
        installer.set_path(PathKey::ExtensionRoot, root);
    }
}

impl Default for PluginAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Slug named by the first `files` entry carrying a `plugin` attribute.
fn plugin_element(manifest: &ManifestView) -> Option<String> {
    let attribute = manifest.kind().as_str();
    manifest
        .files()?
        .children
        .iter()
        .find_map(|entry| entry.attr(attribute))
        .map(clean_element)
        .filter(|element| !element.is_empty())
}

impl KindAdapter for PluginAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.folder = manifest
            .group()
            .map(clean_element)
            .filter(|group| !group.is_empty())
            .ok_or_else(|| InstallError::precondition("plugin manifest has no group"))?;
        self.state.element = plugin_element(manifest).ok_or_else(|| {
            InstallError::precondition("plugin manifest names no file with a `plugin` attribute")
        })?;
        self.register_root(installer);
        Ok(())
    }

    fn script_key(&self) -> String {
        script_key(ExtensionType::Plugin, &self.state.element, Some(&self.state.folder))
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let Some(files) = manifest.files() else {
            return Ok(());
        };
        let old = if self.state.route == InstallRoute::Update {
            let ctx = installer.context();
            find_manifest(ctx.fs, ctx.reader, installer.path(PathKey::ExtensionRoot))
                .ok()
                .and_then(|(path, root)| ManifestView::new(root, path).ok())
        } else {
            None
        };
        installer.parse_files(files, None, old.as_ref().and_then(ManifestView::files))?;
        Ok(())
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Plugin, &self.state.element, &self.state.name);
        record.folder = self.state.folder.clone();
        record.enabled = self.state.folder == AUTO_ENABLED_GROUP;
        record.access = 1;
        record.params = installer.get_params();
        record
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        self.register_root(installer);
        Ok(())
    }

    fn refuse_uninstall(&self, _installer: &Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        if record.folder.trim().is_empty() {
            return Err(InstallError::precondition(format!(
                "plugin `{}` has no group folder",
                record.element
            )));
        }
        Ok(())
    }

    fn installed_manifest_path(&self, installer: &Installer<'_>, record: &ExtensionRecord) -> Option<PathBuf> {
        let ctx = installer.context();
        let root = installer.path(PathKey::ExtensionRoot);
        if let Ok((path, _)) = find_manifest(ctx.fs, ctx.reader, root) {
            return Some(path);
        }
        let flat = ctx
            .config
            .plugins
            .join(&record.folder)
            .join(ctx.manifest_file_name(&record.element));
        ctx.fs.exists(&flat).then_some(flat)
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let ctx = installer.context();
        let mut found = Vec::new();
        for group in ctx.fs.folders(&ctx.config.plugins)? {
            let group_dir = ctx.config.plugins.join(&group);
            let mut candidates: Vec<(String, PathBuf)> = Vec::new();

            let suffix = format!(".{}", ctx.reader.extension());
            for file in ctx.fs.files(&group_dir)? {
                if let Some(element) = file.strip_suffix(&suffix) {
                    candidates.push((element.to_string(), group_dir.join(&file)));
                }
            }
            for element in ctx.fs.folders(&group_dir)? {
                let path = group_dir.join(&element).join(ctx.manifest_file_name(&element));
                if ctx.fs.exists(&path) && !candidates.iter().any(|(seen, _)| *seen == element) {
                    candidates.push((element, path));
                }
            }

            for (element, path) in candidates {
                if let Some(mut record) = discovered_record(installer, ExtensionType::Plugin, &element, &path) {
                    record.folder = group.clone();
                    found.push(record);
                }
            }
        }
        Ok(found)
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.state.adopt(record);
        self.register_root(installer);
        self.installed_manifest_path(installer, record)
            .ok_or_else(|| InstallError::NotFound(format!("manifest of plugin `{}`", record.element)))
    }
}
