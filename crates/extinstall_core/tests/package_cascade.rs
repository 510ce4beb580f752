mod common;

use common::{write_file, write_manifest, write_module, Site};
use extinstall_core::{
    ChildResult, ExtensionType, InstallError, InstallRoute, Installer, InstallerScript, ManifestNode,
    ScriptContext, ScriptError, ScriptRegistry,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Package source whose `packages/` folder holds one module per `children`
/// entry. Entries named `broken` get a manifest without a module file.
fn package_source(site: &Site, children: &[&str], scriptfile: bool) -> PathBuf {
    let src = site.source("pkg_suite");
    let mut files = ManifestNode::new("files").with_attr("folder", "packages");
    for child in children {
        let dir = src.join("packages").join(child);
        if child.contains("broken") {
            write_file(&dir.join("broken.php"), "<?php");
            write_manifest(
                &dir,
                "broken.json",
                &ManifestNode::new("extension")
                    .with_attr("type", "module")
                    .with_text_child("name", "Broken")
                    .with_child(ManifestNode::new("files").with_text_child("filename", "broken.php")),
            );
        } else {
            write_module(&dir, child, child, "site");
        }
        files = files.with_child(
            ManifestNode::new("file")
                .with_attr("type", "module")
                .with_attr("id", *child)
                .with_attr("client", "site")
                .with_text(*child),
        );
    }

    let mut root = ManifestNode::new("extension")
        .with_attr("type", "package")
        .with_text_child("name", "Suite")
        .with_text_child("packagename", "suite")
        .with_child(files);
    if scriptfile {
        write_file(&src.join("script.php"), "<?php // package script");
        root = root.with_text_child("scriptfile", "script.php");
    }
    write_manifest(&src, "pkg_suite.json", &root);
    src
}

fn stored_manifest(site: &Site) -> PathBuf {
    site.config.manifest_store("packages").join("pkg_suite.json")
}

#[test]
fn failing_child_rolls_back_the_children_installed_before_it() {
    let site = Site::new();
    let src = package_source(&site, &["mod_one", "mod_broken", "mod_three"], false);

    let err = site.installer().install(&src).unwrap_err();

    match err {
        InstallError::ChildInstall { child, source } => {
            assert_eq!(child, "mod_broken");
            assert_eq!(source.code(), "precondition_failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(site.extension_count(), 0);
    assert_eq!(site.count("SELECT COUNT(*) FROM modules;"), 0);
    assert!(!site.config.site.join("modules/mod_one").exists());
    assert!(!site.config.site.join("modules/mod_three").exists());
    assert!(!stored_manifest(&site).exists());
}

#[derive(Default)]
struct ResultsRecorder {
    seen: Mutex<Vec<ChildResult>>,
}

impl InstallerScript for ResultsRecorder {
    fn postflight(
        &self,
        route: InstallRoute,
        _cx: &ScriptContext<'_>,
        results: &[ChildResult],
    ) -> Result<(), ScriptError> {
        assert_eq!(route, InstallRoute::Install);
        self.seen.lock().unwrap().extend_from_slice(results);
        Ok(())
    }
}

#[test]
fn postflight_receives_every_child_result() {
    let site = Site::new();
    let src = package_source(&site, &["mod_one", "mod_two"], true);
    let script = Arc::new(ResultsRecorder::default());
    let mut registry = ScriptRegistry::new();
    registry.register("pkg_suite", script.clone());

    let id = Installer::new(site.context().with_scripts(&registry))
        .install(&src)
        .unwrap();

    assert!(id > 0);
    assert_eq!(site.extension_count(), 3);
    assert!(stored_manifest(&site).exists());
    let seen = script.seen.lock().unwrap().clone();
    let names: Vec<&str> = seen.iter().map(|result| result.name.as_str()).collect();
    assert_eq!(names, vec!["mod_one", "mod_two"]);
    assert!(seen.iter().all(|result| result.extension_id != id));
}

#[test]
fn package_uninstall_removes_every_child() {
    let site = Site::new();
    let src = package_source(&site, &["mod_one", "mod_two"], false);
    let id = site.installer().install(&src).unwrap();

    let report = site.installer().uninstall(ExtensionType::Package, id).unwrap();

    assert!(report.is_clean(), "warnings: {:?}", report.warnings);
    assert_eq!(site.extension_count(), 0);
    assert_eq!(site.count("SELECT COUNT(*) FROM modules;"), 0);
    assert!(!site.config.site.join("modules/mod_one").exists());
    assert!(!stored_manifest(&site).exists());
}

#[test]
fn child_that_refuses_removal_keeps_the_package_registered() {
    let site = Site::new();
    let src = package_source(&site, &["mod_one", "mod_two"], false);
    let id = site.installer().install(&src).unwrap();
    site.conn
        .execute("UPDATE extensions SET protected = 1 WHERE element = 'mod_two';", [])
        .unwrap();

    let report = site.installer().uninstall(ExtensionType::Package, id).unwrap();

    assert!(report.record_retained);
    assert!(!report.is_clean());
    assert!(report.warnings.iter().any(|warning| warning.contains("mod_two")));
    assert!(!site.config.site.join("modules/mod_one").exists());
    assert!(site.config.site.join("modules/mod_two").exists());
    assert!(stored_manifest(&site).exists());
    assert_eq!(site.count("SELECT COUNT(*) FROM extensions WHERE type = 'package';"), 1);
}

#[test]
fn package_without_packagename_is_refused() {
    let site = Site::new();
    let src = site.source("pkg_nameless");
    write_manifest(
        &src,
        "pkg_nameless.json",
        &ManifestNode::new("extension")
            .with_attr("type", "package")
            .with_text_child("name", "Nameless")
            .with_child(ManifestNode::new("files")),
    );

    let err = site.installer().install(&src).unwrap_err();

    assert_eq!(err.code(), "precondition_failed");
    assert_eq!(site.extension_count(), 0);
}

/// Childless package `pkg_<name>` shipping a `script.php` with `body`.
fn scripted_package(site: &Site, name: &str, body: &str) -> PathBuf {
    let src = site.source(&format!("pkg_{name}"));
    write_file(&src.join("script.php"), body);
    write_manifest(
        &src,
        &format!("pkg_{name}.json"),
        &ManifestNode::new("extension")
            .with_attr("type", "package")
            .with_text_child("name", name)
            .with_text_child("packagename", name)
            .with_text_child("scriptfile", "script.php")
            .with_child(ManifestNode::new("files")),
    );
    src
}

#[test]
fn package_scripts_do_not_share_a_folder() {
    let site = Site::new();
    let alpha = site.installer().install(scripted_package(&site, "alpha", "alpha script")).unwrap();
    site.installer().install(scripted_package(&site, "beta", "beta script")).unwrap();

    let store = site.config.manifest_store("packages");
    assert!(!store.join("script.php").exists());
    assert_eq!(std::fs::read_to_string(store.join("pkg_alpha/script.php")).unwrap(), "alpha script");
    assert_eq!(std::fs::read_to_string(store.join("pkg_beta/script.php")).unwrap(), "beta script");

    let report = site.installer().uninstall(ExtensionType::Package, alpha).unwrap();

    assert!(report.is_clean(), "warnings: {:?}", report.warnings);
    assert!(!store.join("pkg_alpha").exists());
    assert!(store.join("pkg_beta/script.php").exists());
}
