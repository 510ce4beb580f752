#![allow(dead_code)]

use extinstall_core::fs::{FsError, FsResult};
use extinstall_core::{
    open_db_in_memory, Filesystem, InstallContext, Installer, InstallerConfig, LocalFilesystem,
    ManifestNode,
};
use rusqlite::Connection;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Application tree plus in-memory catalog for one test.
pub struct Site {
    pub dir: TempDir,
    pub config: InstallerConfig,
    pub conn: Connection,
    pub fs: LocalFilesystem,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallerConfig::under(dir.path().join("app"));
        for folder in [&config.site, &config.administrator, &config.plugins, &config.media] {
            std::fs::create_dir_all(folder).unwrap();
        }
        Self {
            dir,
            config,
            conn: open_db_in_memory().unwrap(),
            fs: LocalFilesystem,
        }
    }

    pub fn context(&self) -> InstallContext<'_> {
        InstallContext::new(&self.conn, &self.fs, &self.config)
    }

    pub fn installer(&self) -> Installer<'_> {
        Installer::new(self.context())
    }

    /// Source folder for a package under test, outside the application tree.
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("src").join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    pub fn extension_count(&self) -> i64 {
        self.count("SELECT COUNT(*) FROM extensions;")
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn write_manifest(dir: &Path, file_name: &str, root: &ManifestNode) -> PathBuf {
    let path = dir.join(file_name);
    write_file(&path, &serde_json::to_string_pretty(root).unwrap());
    path
}

pub fn files_node(entries: &[&str]) -> ManifestNode {
    entries
        .iter()
        .fold(ManifestNode::new("files"), |node, entry| node.with_text_child("filename", *entry))
}

/// Module source with `client` and files named after the module.
pub fn module_source(site: &Site, element: &str, client: &str) -> PathBuf {
    let src = site.source(element);
    write_module(&src, element, "Hello Module", client);
    src
}

/// Writes a module's files and manifest into `dir`.
pub fn write_module(dir: &Path, element: &str, name: &str, client: &str) {
    write_file(&dir.join(format!("{element}.php")), "<?php // module");
    write_file(&dir.join("helper.php"), "<?php // helper");
    let root = ManifestNode::new("extension")
        .with_attr("type", "module")
        .with_attr("client", client)
        .with_text_child("name", name)
        .with_text_child("version", "1.0.0")
        .with_child(
            ManifestNode::new("files")
                .with_child(
                    ManifestNode::new("filename")
                        .with_attr("module", element)
                        .with_text(format!("{element}.php")),
                )
                .with_text_child("filename", "helper.php"),
        );
    write_manifest(dir, &format!("{element}.json"), &root);
}

/// Component source listing `site_files` and `admin_files`.
pub fn component_source(site: &Site, name: &str, site_files: &[&str], admin_files: &[&str]) -> PathBuf {
    let src = site.source(name);
    for file in site_files {
        write_file(&src.join("site").join(file), file);
    }
    for file in admin_files {
        write_file(&src.join("admin").join(file), file);
    }
    let root = ManifestNode::new("extension")
        .with_attr("type", "component")
        .with_text_child("name", name)
        .with_text_child("version", "1.0.0")
        .with_child(files_node(site_files).with_attr("folder", "site"))
        .with_child(
            ManifestNode::new("administration")
                .with_child(files_node(admin_files).with_attr("folder", "admin"))
                .with_child(ManifestNode::new("menu").with_text(name))
                .with_child(
                    ManifestNode::new("submenu")
                        .with_child(ManifestNode::new("menu").with_attr("view", "items").with_text("Items")),
                ),
        );
    write_manifest(&src, &format!("{name}.json"), &root);
    src
}

pub fn plugin_source(site: &Site, group: &str, element: &str) -> PathBuf {
    let src = site.source(&format!("plg_{group}_{element}"));
    write_file(&src.join(format!("{element}.php")), "<?php // plugin");
    let root = ManifestNode::new("extension")
        .with_attr("type", "plugin")
        .with_attr("group", group)
        .with_text_child("name", format!("Plugin {element}"))
        .with_child(
            ManifestNode::new("files").with_child(
                ManifestNode::new("filename")
                    .with_attr("plugin", element)
                    .with_text(format!("{element}.php")),
            ),
        );
    write_manifest(&src, &format!("{element}.json"), &root);
    src
}

pub fn template_source(site: &Site, element: &str) -> PathBuf {
    let src = site.source(&format!("tpl_{element}"));
    write_file(&src.join("index.php"), "<?php // template");
    let root = ManifestNode::new("extension")
        .with_attr("type", "template")
        .with_attr("client", "site")
        .with_text_child("name", element)
        .with_child(files_node(&["index.php"]));
    write_manifest(&src, "templateDetails.json", &root);
    src
}

/// Library `lib_acme` installing into `libraries/acme`.
pub fn library_source(site: &Site, scriptfile: bool) -> PathBuf {
    let src = site.source("lib_acme");
    write_file(&src.join("acme.php"), "<?php // acme");
    write_file(&src.join("src/Client.php"), "<?php // client");
    let mut root = ManifestNode::new("extension")
        .with_attr("type", "library")
        .with_text_child("name", "Acme Library")
        .with_text_child("libraryname", "acme")
        .with_child(files_node(&["acme.php"]).with_text_child("folder", "src"));
    if scriptfile {
        write_file(&src.join("script.php"), "<?php // library script");
        root = root.with_text_child("scriptfile", "script.php");
    }
    write_manifest(&src, "lib_acme.json", &root);
    src
}

/// File-set `files_tools`: `cli/tool.php` into `<site>/cli`, `robots.txt`
/// into the site root.
pub fn fileset_source(site: &Site, scriptfile: bool) -> PathBuf {
    let src = site.source("files_tools");
    write_file(&src.join("cli/tool.php"), "<?php // tool");
    write_file(&src.join("robots.txt"), "User-agent: *");
    let mut root = ManifestNode::new("extension")
        .with_attr("type", "file")
        .with_text_child("name", "Tools")
        .with_child(
            ManifestNode::new("fileset")
                .with_child(
                    files_node(&["tool.php"])
                        .with_attr("folder", "cli")
                        .with_attr("target", "cli"),
                )
                .with_child(files_node(&["robots.txt"])),
        );
    if scriptfile {
        write_file(&src.join("script.php"), "<?php // file-set script");
        root = root.with_text_child("scriptfile", "script.php");
    }
    write_manifest(&src, "files_tools.json", &root);
    src
}

/// Filesystem that fails every copy whose destination file name is `poison`.
pub struct FailingFs {
    pub inner: LocalFilesystem,
    pub poison: String,
}

impl FailingFs {
    pub fn new(poison: &str) -> Self {
        Self {
            inner: LocalFilesystem,
            poison: poison.to_string(),
        }
    }

    fn check(&self, dest: &Path) -> FsResult<()> {
        if dest.file_name().is_some_and(|name| name == self.poison.as_str()) {
            return Err(FsError::io(
                "copy",
                dest,
                io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        Ok(())
    }
}

impl Filesystem for FailingFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn create_folder(&self, path: &Path) -> FsResult<Option<PathBuf>> {
        self.inner.create_folder(path)
    }

    fn copy_file(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()> {
        self.check(dest)?;
        self.inner.copy_file(src, dest, overwrite)
    }

    fn copy_folder(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()> {
        self.check(dest)?;
        self.inner.copy_folder(src, dest, overwrite)
    }

    fn delete_folder(&self, path: &Path) -> FsResult<()> {
        self.inner.delete_folder(path)
    }

    fn delete_file(&self, path: &Path) -> FsResult<()> {
        self.inner.delete_file(path)
    }

    fn folders(&self, path: &Path) -> FsResult<Vec<String>> {
        self.inner.folders(path)
    }

    fn files(&self, path: &Path) -> FsResult<Vec<String>> {
        self.inner.files(path)
    }

    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        self.inner.read_to_string(path)
    }
}
