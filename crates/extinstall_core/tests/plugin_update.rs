mod common;

use common::{write_file, write_manifest, Site};
use extinstall_core::{InstallRoute, ManifestNode};
use std::path::Path;

/// Writes `plg_content_cloak` listing the plugin file plus `extra`.
fn write_cloak(src: &Path, extra: &[&str]) {
    write_file(&src.join("cloak.php"), "<?php // plugin");
    let mut files = ManifestNode::new("files").with_child(
        ManifestNode::new("filename")
            .with_attr("plugin", "cloak")
            .with_text("cloak.php"),
    );
    for file in extra {
        write_file(&src.join(file), file);
        files = files.with_text_child("filename", *file);
    }
    let root = ManifestNode::new("extension")
        .with_attr("type", "plugin")
        .with_attr("group", "content")
        .with_text_child("name", "Cloak")
        .with_child(files);
    write_manifest(src, "cloak.json", &root);
}

#[test]
fn plugin_update_deletes_files_dropped_from_the_manifest() {
    let site = Site::new();
    let src = site.source("plg_content_cloak");
    write_cloak(&src, &["old.php"]);
    let id = site.installer().install(&src).unwrap();
    let root = site.config.plugins.join("content/cloak");
    assert!(root.join("old.php").exists());

    write_cloak(&src, &["new.php"]);
    let mut updater = site.installer();
    assert_eq!(updater.update(&src).unwrap(), id);

    assert_eq!(updater.route(), Some(InstallRoute::Update));
    assert!(root.join("cloak.php").exists());
    assert!(root.join("new.php").exists());
    assert!(!root.join("old.php").exists());
    assert_eq!(site.extension_count(), 1);
}
