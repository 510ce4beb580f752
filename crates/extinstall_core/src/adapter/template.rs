//! Template adapter.
//!
//! # Responsibility
//! - Install into `<client>/templates/<element>`.
//! - Own the template's style rows: a default style on first install, all of
//!   them removed on uninstall.
//!
//! # Invariants
//! - A template with a home (default) style is never uninstalled.

use super::{clear_pending_marker, discovered_record, manifest_name, AdapterState, KindAdapter};
use crate::installer::{InstallError, InstallResult, InstallRoute, Installer, PathKey, RollbackStep, UninstallReport};
use crate::manifest::{clean_element, ManifestView};
use crate::model::catalog::TemplateStyle;
use crate::model::extension::{ClientId, ExtensionRecord, ExtensionType};
use std::path::PathBuf;

/// Manifest file stem every template ships.
const MANIFEST_STEM: &str = "templateDetails";
/// Folder never reported by discovery.
const SYSTEM_TEMPLATE: &str = "system";

pub struct TemplateAdapter {
    state: AdapterState,
}

impl TemplateAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Template),
        }
    }

    fn register_root(&self, installer: &mut Installer<'_>) {
        let root = installer
            .context()
            .config
            .client_root(self.state.client)
            .join("templates")
            .join(&self.state.element);
        installer.set_path(PathKey::ExtensionRoot, root);
    }

    /// Inserts the `"<name> - Default"` style.
    fn insert_default_style(&self, installer: &mut Installer<'_>) -> InstallResult<()> {
        let style = TemplateStyle {
            id: None,
            template: self.state.element.clone(),
            client_id: self.state.client,
            home: false,
            title: format!("{} - Default", self.state.name),
            params: installer.get_params(),
        };
        let style_id = installer.context().catalog().styles.insert(&style)?;
        installer.push_step(RollbackStep::StyleRowCreated(style_id));
        Ok(())
    }
}

impl Default for TemplateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn template_element(manifest: &ManifestView) -> InstallResult<String> {
    let raw = match manifest.value("element") {
        Some(element) => element.to_string(),
        None => manifest_name(manifest)?,
    };
    let element = clean_element(&raw.replace(' ', "_"));
    if element.is_empty() {
        return Err(InstallError::precondition("template manifest yields an empty element"));
    }
    Ok(element)
}

impl KindAdapter for TemplateAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.client = manifest.client()?.unwrap_or_default();
        self.state.element = template_element(manifest)?;
        self.register_root(installer);
        Ok(())
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        for list in ["files", "images", "css"] {
            if let Some(node) = manifest.root().child(list) {
                installer.parse_files(node, None, None)?;
            }
        }
        Ok(())
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Template, &self.state.element, &self.state.name);
        record.client_id = self.state.client;
        record.enabled = true;
        record.access = 1;
        record.params = installer.get_params();
        record
    }

    fn finalise_install(&mut self, installer: &mut Installer<'_>, _manifest: &ManifestView) -> InstallResult<()> {
        clear_pending_marker(installer, &self.state)?;
        // A reinstall over an existing row keeps that row's styles.
        if self.state.route == InstallRoute::Install && self.state.current_extension_id.is_none() {
            self.insert_default_style(installer)?;
        }
        Ok(())
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        self.register_root(installer);
        Ok(())
    }

    fn refuse_uninstall(&self, installer: &Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        let styles = installer
            .context()
            .catalog()
            .styles
            .list_for_template(&record.element, record.client_id)?;
        if styles.iter().any(|style| style.home) {
            return Err(InstallError::precondition(format!(
                "template `{}` is the default for the {} client",
                record.element,
                record.client_id.name()
            )));
        }
        Ok(())
    }

    fn remove_auxiliary(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord, report: &mut UninstallReport) {
        let catalog = installer.context().catalog();
        match catalog.styles.list_for_template(&record.element, record.client_id) {
            Ok(styles) => {
                let ids: Vec<i64> = styles.iter().filter_map(|style| style.id).collect();
                if let Err(err) = catalog.menus.reset_template_styles(&ids) {
                    report.warn("reset_menu_styles", err);
                }
            }
            Err(err) => report.warn("list_styles", err),
        }
        if let Err(err) = catalog.styles.delete_for_template(&record.element, record.client_id) {
            report.warn("delete_styles", err);
        }
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let ctx = installer.context();
        let file_name = ctx.manifest_file_name(MANIFEST_STEM);
        let mut found = Vec::new();
        for client in [ClientId::Site, ClientId::Administrator] {
            let dir = ctx.config.client_root(client).join("templates");
            for element in ctx.fs.folders(&dir)? {
                if element == SYSTEM_TEMPLATE {
                    continue;
                }
                let path = dir.join(&element).join(&file_name);
                if !ctx.fs.exists(&path) {
                    continue;
                }
                if let Some(mut record) = discovered_record(installer, ExtensionType::Template, &element, &path) {
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
        let file_name = installer.context().manifest_file_name(MANIFEST_STEM);
        Ok(installer.path(PathKey::ExtensionRoot).join(file_name))
    }

    fn finalise_discover_install(&mut self, installer: &mut Installer<'_>, _manifest: &ManifestView) -> InstallResult<()> {
        self.insert_default_style(installer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestNode;

    #[test]
    fn element_falls_back_to_cleaned_name() {
        let root = ManifestNode::new("extension")
            .with_attr("type", "template")
            .with_text_child("name", "Beez Five");
        let manifest = ManifestView::new(root, "/src/templateDetails.json").expect("valid manifest");
        assert_eq!(template_element(&manifest).expect("element"), "beez_five");
    }
}
