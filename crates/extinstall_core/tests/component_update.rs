mod common;

use common::{component_source, write_file, write_manifest, Site};
use extinstall_core::repo::{AssetRepository, MenuRepository};
use extinstall_core::{ExtensionRepository, ExtensionType, ManifestNode, SqliteExtensionRepository};

#[test]
fn component_install_registers_menus_and_asset() {
    let site = Site::new();
    let src = component_source(&site, "shop", &["shop.php"], &["admin.php"]);

    let id = site.installer().install(&src).unwrap();

    let record = SqliteExtensionRepository::new(&site.conn).load(id).unwrap();
    assert_eq!(record.element, "com_shop");
    assert!(record.enabled);
    assert!(site.config.site.join("components/com_shop/shop.php").exists());
    let admin_root = site.config.administrator.join("components/com_shop");
    assert!(admin_root.join("admin.php").exists());
    assert!(admin_root.join("shop.json").exists());

    let titles = MenuRepository::new(&site.conn).titles_for_component(id).unwrap();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"shop".to_string()));
    assert!(titles.contains(&"Items".to_string()));
    let link: String = site
        .conn
        .query_row(
            "SELECT link FROM menu WHERE component_id = ?1 AND title = 'Items';",
            [id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(link, "index.php?option=com_shop&view=items");

    let asset = AssetRepository::new(&site.conn).find_by_name("com_shop").unwrap();
    assert!(asset.is_some());
}

#[test]
fn update_deletes_files_dropped_from_the_manifest() {
    let site = Site::new();
    let src = component_source(&site, "shop", &["a.php", "b.php", "c.php"], &["admin.php"]);
    let id = site.installer().install(&src).unwrap();
    let site_root = site.config.site.join("components/com_shop");
    assert!(site_root.join("b.php").exists());

    component_source(&site, "shop", &["a.php", "c.php", "d.php"], &["admin.php"]);
    let mut updater = site.installer();
    assert_eq!(updater.update(&src).unwrap(), id);

    assert!(site_root.join("a.php").exists());
    assert!(!site_root.join("b.php").exists());
    assert!(site_root.join("c.php").exists());
    assert!(site_root.join("d.php").exists());
    assert_eq!(site.extension_count(), 1);
    assert_eq!(MenuRepository::new(&site.conn).titles_for_component(id).unwrap().len(), 2);
    assert_eq!(site.count("SELECT COUNT(*) FROM assets WHERE name = 'com_shop';"), 1);
}

#[test]
fn uninstall_removes_roots_menus_asset_media_and_languages() {
    let site = Site::new();
    let src = component_source(&site, "shop", &["shop.php"], &["admin.php"]);
    write_file(&src.join("media/shop.css"), "body {}");
    write_file(&src.join("language/en-GB.com_shop.ini"), "COM_SHOP=\"Shop\"");
    std::fs::create_dir_all(site.config.site.join("language/en-GB")).unwrap();

    let manifest: ManifestNode =
        serde_json::from_str(&std::fs::read_to_string(src.join("shop.json")).unwrap()).unwrap();
    let manifest = manifest
        .with_child(
            ManifestNode::new("media")
                .with_attr("folder", "media")
                .with_attr("destination", "com_shop")
                .with_text_child("filename", "shop.css"),
        )
        .with_child(
            ManifestNode::new("languages").with_attr("folder", "language").with_child(
                ManifestNode::new("language")
                    .with_attr("tag", "en-GB")
                    .with_text("en-GB.com_shop.ini"),
            ),
        );
    write_manifest(&src, "shop.json", &manifest);

    let id = site.installer().install(&src).unwrap();
    let css = site.config.media.join("com_shop/shop.css");
    let language = site.config.site.join("language/en-GB/en-GB.com_shop.ini");
    assert!(css.exists());
    assert!(language.exists());

    let report = site.installer().uninstall(ExtensionType::Component, id).unwrap();

    assert!(report.is_clean(), "warnings: {:?}", report.warnings);
    assert!(!css.exists());
    assert!(!language.exists());
    assert!(!site.config.site.join("components/com_shop").exists());
    assert!(!site.config.administrator.join("components/com_shop").exists());
    assert_eq!(site.count("SELECT COUNT(*) FROM menu;"), 0);
    assert_eq!(site.count("SELECT COUNT(*) FROM assets WHERE name = 'com_shop';"), 0);
    assert_eq!(site.extension_count(), 0);
}
