use super::*;

#[test]
fn test_open_creates_schema() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("wahub.db");
    let db = Database::open(&path).unwrap();
    assert!(path.exists());

    let tables: Vec<String> = db
        .with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .unwrap();
    for expected in [
        "deal_submissions",
        "processed_messages",
        "sessions",
        "tenant_tokens",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
    }
}

#[test]
fn test_reopen_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("wahub.db");
    drop(Database::open(&path).unwrap());
    assert!(Database::open(&path).is_ok());
}

#[test]
fn test_in_memory() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.path(), ":memory:");
    let count: i64 = db
        .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0)))
        .unwrap();
    assert_eq!(count, 0);
}
