use mem42::db;
use mem42::db::migrations::{
    get_embedding_model, get_schema_version, get_vector_dimension, set_embedding_model,
    CURRENT_SCHEMA_VERSION,
};

#[test]
fn open_database_creates_file_and_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mem42.db");

    let conn = db::open_database(&path).unwrap();
    assert!(path.exists());
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |r| r.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn reopening_is_idempotent_and_keeps_meta() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mem42.db");

    {
        let conn = db::open_database(&path).unwrap();
        set_embedding_model(&conn, "text-embedding-004").unwrap();
        assert_eq!(get_vector_dimension(&conn).unwrap(), None);
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_embedding_model(&conn).unwrap().as_deref(),
        Some("text-embedding-004")
    );
}

#[test]
fn expected_tables_exist() {
    let conn = db::open_memory_database().unwrap();
    for table in ["engrams", "memory_points", "schema_meta"] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {table}");
    }
}
