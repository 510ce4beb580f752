//! Module adapter.
//!
//! # Responsibility
//! - Install into `<client>/modules/<element>`.
//! - Create the unpublished module instance on first install and remove
//!   every instance on uninstall.

use super::{discovered_record, folder_manifests, manifest_name, AdapterState, KindAdapter};
use crate::installer::{InstallError, InstallResult, Installer, PathKey, RollbackStep, UninstallReport};
use crate::manifest::{clean_element, ManifestView};
use crate::model::catalog::ModuleInstance;
use crate::model::extension::{ClientId, ExtensionId, ExtensionRecord, ExtensionType};
use std::path::PathBuf;

pub struct ModuleAdapter {
    state: AdapterState,
}

impl ModuleAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Module),
        }
    }

    fn register_root(&self, installer: &mut Installer<'_>) {
        let root = installer
            .context()
            .config
            .client_root(self.state.client)
            .join("modules")
            .join(&self.state.element);
        installer.set_path(PathKey::ExtensionRoot, root);
    }
}

impl Default for ModuleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Slug named by the first `files` entry carrying a `module` attribute.
fn module_element(manifest: &ManifestView) -> Option<String> {
    manifest
        .files()?
        .children
        .iter()
        .find_map(|entry| entry.attr("module"))
        .map(clean_element)
        .filter(|element| !element.is_empty())
}

impl KindAdapter for ModuleAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.client = manifest.client()?.unwrap_or_default();
        self.state.element = module_element(manifest).ok_or_else(|| {
            InstallError::precondition("module manifest names no file with a `module` attribute")
        })?;
        self.register_root(installer);
        Ok(())
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        if let Some(files) = manifest.files() {
            installer.parse_files(files, None, None)?;
        }
        Ok(())
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Module, &self.state.element, &self.state.name);
        record.client_id = self.state.client;
        record.enabled = true;
        record.access = if self.state.client == ClientId::Administrator { 2 } else { 0 };
        record.params = installer.get_params();
        record
    }

    fn after_insert(&mut self, installer: &mut Installer<'_>, _id: ExtensionId) -> InstallResult<()> {
        let instance = ModuleInstance::unpublished(
            &self.state.element,
            &self.state.name,
            self.state.client,
            &installer.get_params(),
        );
        let module_id = installer.context().catalog().modules.insert(&instance)?;
        installer.push_step(RollbackStep::ModuleRowCreated(module_id));
        Ok(())
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        self.register_root(installer);
        Ok(())
    }

    fn remove_auxiliary(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord, report: &mut UninstallReport) {
        let modules = installer.context().catalog().modules;
        if let Err(err) = modules.delete_for_module(&record.element, record.client_id) {
            report.warn("delete_module_instances", err);
        }
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let config = installer.context().config;
        let mut found = Vec::new();
        for client in [ClientId::Site, ClientId::Administrator] {
            let dir = config.client_root(client).join("modules");
            for (element, manifest_path) in folder_manifests(installer, &dir)? {
                if let Some(mut record) = discovered_record(installer, ExtensionType::Module, &element, &manifest_path) {
                    record.client_id = client;
                    found.push(record);
                }
            }
        }
        Ok(found)
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.state.adopt(record);
        self.register_root(installer);
        let file_name = installer.context().manifest_file_name(&record.element);
        Ok(installer.path(PathKey::ExtensionRoot).join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestNode;

    #[test]
    fn element_comes_from_module_attribute() {
        let root = ManifestNode::new("extension")
            .with_attr("type", "module")
            .with_text_child("name", "Hello")
            .with_child(
                ManifestNode::new("files")
                    .with_child(ManifestNode::new("filename").with_text("helper.php"))
                    .with_child(
                        ManifestNode::new("filename")
                            .with_attr("module", "Mod_Hello")
                            .with_text("mod_hello.php"),
                    ),
            );
        let manifest = ManifestView::new(root, "/src/mod_hello.json").expect("valid manifest");
        assert_eq!(module_element(&manifest).as_deref(), Some("mod_hello"));
    }

    #[test]
    fn missing_module_attribute_yields_none() {
        let root = ManifestNode::new("extension")
            .with_attr("type", "module")
            .with_child(ManifestNode::new("files").with_text_child("filename", "a.php"));
        let manifest = ManifestView::new(root, "/src/x.json").expect("valid manifest");
        assert_eq!(module_element(&manifest), None);
    }
}
