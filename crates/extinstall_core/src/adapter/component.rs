//! Component adapter.
//!
//! # Responsibility
//! - Install into the dual `{site,administrator}/components/<element>` roots.
//! - Maintain the component's admin menu rows and access asset.
//!
//! # Invariants
//! - The element always carries the `com_` prefix.
//! - Menu failures during finalise are warnings; the install still commits.

use super::{clear_pending_marker, discovered_record, manifest_name, AdapterState, KindAdapter};
use crate::installer::{
    InstallError, InstallResult, InstallRoute, Installer, PathKey, RollbackStep, UninstallReport,
};
use crate::manifest::{clean_element, find_manifest, ManifestNode, ManifestView};
use crate::model::catalog::{Asset, MenuItem};
use crate::model::extension::{ClientId, ExtensionId, ExtensionRecord, ExtensionType};
use crate::repo::asset_repo::ROOT_ASSET_ID;
use log::{info, warn};
use std::path::{Path, PathBuf};

const PREFIX: &str = "com_";
const ADMIN_MENU_TYPE: &str = "main";
const SUBMENU_KEYS: &[&str] = &["view", "task", "controller", "act", "layout", "sub"];

pub struct ComponentAdapter {
    state: AdapterState,
}

impl ComponentAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ExtensionType::Component),
        }
    }

    fn register_roots(&self, installer: &mut Installer<'_>) {
        let config = installer.context().config;
        let site = config.site.join("components").join(&self.state.element);
        let admin = config.administrator.join("components").join(&self.state.element);
        installer.set_path(PathKey::ExtensionSite, site);
        installer.set_path(PathKey::ExtensionAdministrator, admin.clone());
        installer.set_path(PathKey::ExtensionRoot, admin);
    }

    /// Manifest left in the administrator root by the previous install.
    fn installed_manifest(&self, installer: &Installer<'_>) -> Option<ManifestView> {
        let ctx = installer.context();
        let (path, root) =
            find_manifest(ctx.fs, ctx.reader, installer.path(PathKey::ExtensionAdministrator)).ok()?;
        ManifestView::new(root, path).ok()
    }

    /// Registers the access asset unless one already exists.
    fn register_asset(&self, installer: &mut Installer<'_>) -> InstallResult<()> {
        let assets = installer.context().catalog().assets;
        if assets.find_by_name(&self.state.element)?.is_some() {
            return Ok(());
        }
        assets.insert(&Asset {
            id: None,
            parent_id: ROOT_ASSET_ID,
            name: self.state.element.clone(),
            title: self.state.element.clone(),
            rules: "{}".to_string(),
        })?;
        installer.push_step(RollbackStep::AssetCreated(self.state.element.clone()));
        Ok(())
    }

    /// Builds the admin menu and submenu rows declared under
    /// `administration`. Existing rows are kept unless overwrite is set.
    fn build_admin_menus(
        &self,
        installer: &mut Installer<'_>,
        manifest: &ManifestView,
        component_id: ExtensionId,
    ) -> InstallResult<usize> {
        let menus = installer.context().catalog().menus;
        let existing = menus.titles_for_component(component_id)?;
        if !existing.is_empty() {
            if !installer.overwrite() {
                return Ok(0);
            }
            menus.delete_for_component(component_id)?;
        }

        let Some(menu) = manifest.node("administration/menu") else {
            return Ok(0);
        };
        let element = &self.state.element;
        let title = menu.value().unwrap_or(&self.state.name).to_string();
        let parent = MenuItem {
            id: None,
            menutype: ADMIN_MENU_TYPE.to_string(),
            alias: clean_element(&title),
            link: format!("index.php?option={element}"),
            item_type: "component".to_string(),
            published: true,
            parent_id: 1,
            component_id,
            client_id: ClientId::Administrator,
            img: menu.attr("img").unwrap_or("class:component").to_string(),
            home: false,
            template_style_id: 0,
            title,
        };
        let parent_id = menus.insert(&parent)?;
        if existing.is_empty() {
            installer.push_step(RollbackStep::MenuItemsCreated { component_id });
        }

        let mut created = 1;
        if let Some(submenu) = manifest.node("administration/submenu") {
            for child in submenu.children_named("menu") {
                let Some(title) = child.value() else {
                    continue;
                };
                menus.insert(&MenuItem {
                    id: None,
                    menutype: ADMIN_MENU_TYPE.to_string(),
                    title: title.to_string(),
                    alias: format!("{}-{}", element, clean_element(title)),
                    link: submenu_link(element, child),
                    item_type: "component".to_string(),
                    published: true,
                    parent_id,
                    component_id,
                    client_id: ClientId::Administrator,
                    img: child.attr("img").unwrap_or("class:component").to_string(),
                    home: false,
                    template_style_id: 0,
                })?;
                created += 1;
            }
        }
        info!(
            "event=admin_menu_build module=adapter status=ok element={} items={}",
            element, created
        );
        Ok(created)
    }

    fn finalise_registration(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let Some(id) = self
            .state
            .record
            .as_ref()
            .and_then(|record| record.extension_id)
        else {
            return Ok(());
        };
        if let Err(err) = self.build_admin_menus(installer, manifest, id) {
            warn!(
                "event=admin_menu_build module=adapter status=warning element={} error={}",
                self.state.element, err
            );
        }
        self.register_asset(installer)
    }
}

impl Default for ComponentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Link of a submenu entry: an explicit `link` attribute, or the option
/// plus whichever of `view`, `task` and friends are set.
fn submenu_link(element: &str, node: &ManifestNode) -> String {
    if let Some(link) = node.attr("link").map(str::trim).filter(|link| !link.is_empty()) {
        return format!("index.php?{link}");
    }
    let mut link = format!("index.php?option={element}");
    for key in SUBMENU_KEYS {
        if let Some(value) = node.attr(key).map(str::trim).filter(|value| !value.is_empty()) {
            link.push_str(&format!("&{key}={value}"));
        }
    }
    link
}

/// `com_` prefixed slug from `<element>` or `<name>`.
fn component_element(manifest: &ManifestView) -> InstallResult<String> {
    let raw = match manifest.value("element") {
        Some(element) => element.to_string(),
        None => manifest_name(manifest)?,
    };
    let cleaned = clean_element(&raw);
    Ok(if cleaned.starts_with(PREFIX) {
        cleaned
    } else {
        format!("{PREFIX}{cleaned}")
    })
}

impl KindAdapter for ComponentAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn setup_install_paths(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.state.name = manifest_name(manifest)?;
        self.state.element = component_element(manifest)?;
        self.state.client = ClientId::Administrator;
        self.register_roots(installer);
        Ok(())
    }

    fn occupied_paths(&self, installer: &Installer<'_>) -> Vec<PathBuf> {
        vec![
            installer.path(PathKey::ExtensionSite).to_path_buf(),
            installer.path(PathKey::ExtensionAdministrator).to_path_buf(),
        ]
    }

    fn create_extension_root(&mut self, installer: &mut Installer<'_>) -> InstallResult<()> {
        let site = installer.path(PathKey::ExtensionSite).to_path_buf();
        let admin = installer.path(PathKey::ExtensionAdministrator).to_path_buf();
        installer.create_folder(&site)?;
        installer.create_folder(&admin)?;
        Ok(())
    }

    fn copy_base_files(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        let old = if self.state.route == InstallRoute::Update {
            self.installed_manifest(installer)
        } else {
            None
        };

        if let Some(files) = manifest.files() {
            let old_files = old.as_ref().and_then(|old| old.files());
            installer.parse_files(files, Some(ClientId::Site), old_files)?;
        }
        if let Some(files) = manifest.node("administration/files") {
            let old_files = old.as_ref().and_then(|old| old.node("administration/files"));
            installer.parse_files(files, Some(ClientId::Administrator), old_files)?;
        }
        Ok(())
    }

    fn parse_optional_tags(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        if let Some(media) = manifest.media() {
            installer.parse_media(media)?;
        }
        if let Some(languages) = manifest.languages() {
            installer.parse_languages(languages, ClientId::Site)?;
        }
        if let Some(languages) = manifest.node("administration/languages") {
            installer.parse_languages(languages, ClientId::Administrator)?;
        }
        Ok(())
    }

    fn default_record(&self, installer: &Installer<'_>) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(ExtensionType::Component, &self.state.element, &self.state.name);
        record.client_id = ClientId::Administrator;
        record.enabled = true;
        record.access = 0;
        record.params = installer.get_params();
        record
    }

    fn finalise_install(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        clear_pending_marker(installer, &self.state)?;
        self.finalise_registration(installer, manifest)
    }

    fn setup_uninstall(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<()> {
        self.state.adopt(record);
        self.register_roots(installer);
        Ok(())
    }

    fn installed_manifest_path(&self, installer: &Installer<'_>, _record: &ExtensionRecord) -> Option<PathBuf> {
        self.installed_manifest(installer)
            .map(|manifest| manifest.path().to_path_buf())
    }

    fn remove_auxiliary(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord, report: &mut UninstallReport) {
        let catalog = installer.context().catalog();
        if let Some(id) = record.extension_id {
            if let Err(err) = catalog.menus.delete_for_component(id) {
                report.warn("delete_menus", err);
            }
        }
        if let Err(err) = catalog.assets.delete_by_name(&record.element) {
            report.warn("delete_asset", err);
        }
        if let Err(err) = clear_pending_marker(installer, &self.state) {
            report.warn("clear_update_marker", err);
        }
    }

    fn remove_extension_files(
        &mut self,
        installer: &mut Installer<'_>,
        _record: &ExtensionRecord,
        manifest: Option<&ManifestView>,
        report: &mut UninstallReport,
    ) {
        if let Some(manifest) = manifest {
            if let Some(media) = manifest.media() {
                installer.remove_files(media, None, report);
            }
            if let Some(languages) = manifest.languages() {
                installer.remove_files(languages, Some(ClientId::Site), report);
            }
            if let Some(languages) = manifest.node("administration/languages") {
                installer.remove_files(languages, Some(ClientId::Administrator), report);
            }
        }
        let fs = installer.context().fs;
        for key in [PathKey::ExtensionSite, PathKey::ExtensionAdministrator] {
            if let Err(err) = fs.delete_folder(installer.path(key)) {
                report.warn("delete_root", err);
            }
        }
    }

    fn discover(&self, installer: &Installer<'_>) -> InstallResult<Vec<ExtensionRecord>> {
        let config = installer.context().config;
        let mut found: Vec<ExtensionRecord> = Vec::new();
        for client in [ClientId::Administrator, ClientId::Site] {
            let dir = config.client_root(client).join("components");
            for (folder, manifest_path) in short_name_manifests(installer, &dir)? {
                if found.iter().any(|record| record.element == folder) {
                    continue;
                }
                if let Some(mut record) =
                    discovered_record(installer, ExtensionType::Component, &folder, &manifest_path)
                {
                    record.client_id = ClientId::Administrator;
                    found.push(record);
                }
            }
        }
        Ok(found)
    }

    fn prepare_discover_install(&mut self, installer: &mut Installer<'_>, record: &ExtensionRecord) -> InstallResult<PathBuf> {
        self.state.adopt(record);
        self.register_roots(installer);
        let short = record.element.strip_prefix(PREFIX).unwrap_or(&record.element);
        let file_name = installer.context().manifest_file_name(short);
        let fs = installer.context().fs;
        for key in [PathKey::ExtensionAdministrator, PathKey::ExtensionSite] {
            let candidate = installer.path(key).join(&file_name);
            if fs.exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(InstallError::NotFound(format!(
            "manifest of component `{}`",
            record.element
        )))
    }

    fn finalise_discover_install(&mut self, installer: &mut Installer<'_>, manifest: &ManifestView) -> InstallResult<()> {
        self.finalise_registration(installer, manifest)
    }
}

/// `components/com_x/x.<ext>` manifests below `dir`.
fn short_name_manifests(installer: &Installer<'_>, dir: &Path) -> InstallResult<Vec<(String, PathBuf)>> {
    let ctx = installer.context();
    let mut found = Vec::new();
    for folder in ctx.fs.folders(dir)? {
        let short = folder.strip_prefix(PREFIX).unwrap_or(&folder);
        let path = dir.join(&folder).join(ctx.manifest_file_name(short));
        if ctx.fs.exists(&path) {
            found.push((folder.clone(), path));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(element: Option<&str>) -> ManifestView {
        let mut root = ManifestNode::new("extension")
            .with_attr("type", "component")
            .with_text_child("name", "Hello World");
        if let Some(element) = element {
            root = root.with_text_child("element", element);
        }
        ManifestView::new(root, Path::new("/src/hello.json")).expect("valid manifest")
    }

    #[test]
    fn element_gets_com_prefix_once() {
        assert_eq!(component_element(&manifest(None)).expect("element"), "com_helloworld");
        assert_eq!(component_element(&manifest(Some("com_Foo"))).expect("element"), "com_foo");
    }

    #[test]
    fn submenu_link_prefers_explicit_link() {
        let explicit = ManifestNode::new("menu").with_attr("link", "option=com_foo&view=bars");
        assert_eq!(submenu_link("com_foo", &explicit), "index.php?option=com_foo&view=bars");

        let parts = ManifestNode::new("menu")
            .with_attr("view", "items")
            .with_attr("layout", "edit");
        assert_eq!(
            submenu_link("com_foo", &parts),
            "index.php?option=com_foo&view=items&layout=edit"
        );
    }
}
