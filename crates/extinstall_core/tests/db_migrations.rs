use extinstall_core::db::migrations::{latest_version, schema_version};
use extinstall_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in [
        "extensions",
        "schemas",
        "updates",
        "menu",
        "modules",
        "modules_menu",
        "template_styles",
        "assets",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn extension_identity_is_unique_per_kind_element_folder_and_client() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO extensions (name, type, element, folder, client_id)
        VALUES ('Hello', 'module', 'mod_hello', '', ?1);";

    conn.execute(insert, [0]).unwrap();
    conn.execute(insert, [1]).unwrap();
    assert!(conn.execute(insert, [0]).is_err());
}

#[test]
fn unknown_extension_type_is_rejected_by_the_schema() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO extensions (name, type, element) VALUES ('X', 'widget', 'x');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn deleting_an_extension_cascades_to_its_schema_version() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO extensions (name, type, element) VALUES ('Foo', 'component', 'com_foo');",
        [],
    )
    .unwrap();
    let id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO schemas (extension_id, version_id) VALUES (?1, '1.0.0');",
        [id],
    )
    .unwrap();

    conn.execute("DELETE FROM extensions WHERE extension_id = ?1;", [id])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM schemas;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "extensions");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
