mod common;

use common::{component_source, module_source, template_source, write_file, write_manifest, Site};
use extinstall_core::repo::MarkerRepository;
use extinstall_core::{
    ExtensionRepository, ExtensionType, InstallError, InstallRoute, ManifestNode, SqliteExtensionRepository,
};

#[test]
fn installing_twice_with_overwrite_keeps_one_row_and_id() {
    let site = Site::new();
    let src = module_source(&site, "mod_hello", "site");

    let mut first = site.installer();
    first.set_overwrite(true);
    let first_id = first.install(&src).unwrap();

    let mut second = site.installer();
    second.set_overwrite(true);
    let second_id = second.install(&src).unwrap();

    assert_eq!(first_id, second_id);
    assert_eq!(site.extension_count(), 1);
    assert_eq!(first.route(), Some(InstallRoute::Install));
    assert_eq!(second.route(), Some(InstallRoute::Update));
    assert_eq!(site.count("SELECT COUNT(*) FROM modules;"), 1);
}

#[test]
fn occupied_folder_without_overwrite_is_refused() {
    let site = Site::new();
    let src = module_source(&site, "mod_hello", "site");
    site.installer().install(&src).unwrap();

    let err = site.installer().install(&src).unwrap_err();

    match err {
        InstallError::Precondition(message) => assert!(message.contains("already in use")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(site.extension_count(), 1);
    assert!(site.config.site.join("modules/mod_hello/mod_hello.php").exists());
}

#[test]
fn update_without_installed_record_falls_back_to_install() {
    let site = Site::new();
    let src = module_source(&site, "mod_hello", "site");

    let mut installer = site.installer();
    let id = installer.update(&src).unwrap();

    assert!(id > 0);
    assert_eq!(installer.route(), Some(InstallRoute::Install));
}

#[test]
fn upgrade_method_switches_to_update_without_overwrite_flag() {
    let site = Site::new();
    let src = module_source(&site, "mod_hello", "site");
    let id = site.installer().install(&src).unwrap();

    let manifest_path = src.join("mod_hello.json");
    let mut root: ManifestNode =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    root.attributes.insert("method".to_string(), "upgrade".to_string());
    root.children.retain(|child| child.name != "version");
    let root = root.with_text_child("version", "1.1.0");
    write_manifest(&src, "mod_hello.json", &root);

    let mut installer = site.installer();
    let updated = installer.install(&src).unwrap();

    assert_eq!(updated, id);
    assert_eq!(installer.route(), Some(InstallRoute::Update));
    let record = SqliteExtensionRepository::new(&site.conn).load(id).unwrap();
    assert!(record.manifest_cache.contains("\"version\":\"1.1.0\""));
}

#[test]
fn update_runs_only_newer_schema_files() {
    let site = Site::new();
    let src = component_source(&site, "shop", &["shop.php"], &["shop.php"]);
    let manifest_path = src.join("shop.json");
    let root: ManifestNode =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();

    write_file(
        &src.join("sql/install.sqlite.sql"),
        "CREATE TABLE shop_items (id INTEGER PRIMARY KEY, title TEXT);",
    );
    write_file(&src.join("sql/updates/sqlite/1.0.0.sql"), "SELECT 1;");
    let install_root = root
        .clone()
        .with_child(
            ManifestNode::new("install").with_child(
                ManifestNode::new("sql").with_child(
                    ManifestNode::new("file")
                        .with_attr("driver", "sqlite")
                        .with_text("sql/install.sqlite.sql"),
                ),
            ),
        )
        .with_child(update_schemas());
    write_manifest(&src, "shop.json", &install_root);

    let id = site.installer().install(&src).unwrap();
    let markers = MarkerRepository::new(&site.conn);
    assert_eq!(markers.schema_version(id).unwrap().as_deref(), Some("1.0.0"));
    assert_eq!(site.count("SELECT COUNT(*) FROM shop_items;"), 0);

    write_file(
        &src.join("sql/updates/sqlite/1.1.0.sql"),
        "ALTER TABLE shop_items ADD COLUMN price INTEGER NOT NULL DEFAULT 0;",
    );
    write_file(
        &src.join("sql/updates/sqlite/1.10.0.sql"),
        "INSERT INTO shop_items (title, price) VALUES ('seed', 10);",
    );
    let mut updater = site.installer();
    assert_eq!(updater.update(&src).unwrap(), id);
    assert_eq!(updater.route(), Some(InstallRoute::Update));

    assert_eq!(markers.schema_version(id).unwrap().as_deref(), Some("1.10.0"));
    assert_eq!(site.count("SELECT SUM(price) FROM shop_items;"), 10);
}

fn update_schemas() -> ManifestNode {
    ManifestNode::new("update").with_child(
        ManifestNode::new("schemas").with_child(
            ManifestNode::new("schemapath")
                .with_attr("type", "sqlite")
                .with_text("sql/updates/sqlite"),
        ),
    )
}

#[test]
fn pending_update_marker_is_cleared_by_install() {
    let site = Site::new();
    let markers = MarkerRepository::new(&site.conn);
    markers
        .add_pending_update(
            ExtensionType::Module,
            "mod_hello",
            extinstall_core::ClientId::Site,
            "",
            "2.0.0",
        )
        .unwrap();
    let src = module_source(&site, "mod_hello", "site");

    site.installer().install(&src).unwrap();

    assert!(!markers
        .has_pending_update(ExtensionType::Module, "mod_hello", extinstall_core::ClientId::Site, "")
        .unwrap());
}

#[test]
fn archives_with_a_wrapper_folder_install_like_directories() {
    let site = Site::new();
    let src = module_source(&site, "mod_packed", "site");
    let archive = site.dir.path().join("mod_packed.tar.gz");
    {
        let file = std::fs::File::create(&archive).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all("mod_packed", &src).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    let id = site.installer().install(&archive).unwrap();

    let record = SqliteExtensionRepository::new(&site.conn).load(id).unwrap();
    assert_eq!(record.element, "mod_packed");
    assert!(site.config.site.join("modules/mod_packed/helper.php").exists());
}

#[test]
fn template_reinstall_over_a_kept_row_adds_no_second_style() {
    let site = Site::new();
    let src = template_source(&site, "corp");
    let id = site.installer().install(&src).unwrap();
    std::fs::remove_dir_all(site.config.site.join("templates/corp")).unwrap();

    let mut installer = site.installer();
    installer.set_overwrite(true);
    assert_eq!(installer.install(&src).unwrap(), id);

    assert_eq!(installer.route(), Some(InstallRoute::Install));
    assert!(site.config.site.join("templates/corp/index.php").exists());
    assert_eq!(site.extension_count(), 1);
    assert_eq!(site.count("SELECT COUNT(*) FROM template_styles;"), 1);
}
