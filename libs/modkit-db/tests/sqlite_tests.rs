//! Tests for SQLite-specific functionality.

#![cfg(feature = "sqlite")]

use modkit_db::{ConnectOpts, DbEngine, DbHandle};
use sea_orm::{ConnectionTrait, Statement};
use tempfile::TempDir;

async fn pragma_value(db: &DbHandle, pragma: &str) -> String {
    let pool = db.sqlx_sqlite().expect("sqlite pool");
    let row: (String,) = sqlx::query_as(&format!("PRAGMA {pragma}"))
        .fetch_one(pool)
        .await
        .expect("pragma query");
    row.0
}

#[tokio::test]
async fn test_memory_database_is_shared_by_the_pool() {
    let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default())
        .await
        .unwrap();
    assert_eq!(db.engine(), DbEngine::Sqlite);

    let conn = db.sea();
    conn.execute(Statement::from_string(
        conn.get_database_backend(),
        "CREATE TABLE t (id INTEGER PRIMARY KEY)",
    ))
    .await
    .unwrap();

    // A second query must see the table created above.
    let pool = db.sqlx_sqlite().unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_file_database_creates_parent_dirs_and_uses_wal() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("vouchers.db");
    let dsn = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let db = DbHandle::connect(&dsn, ConnectOpts::default()).await.unwrap();

    assert!(db_path.exists(), "database file should be created");
    assert_eq!(pragma_value(&db, "journal_mode").await.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_dsn_pragmas_override_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("pragmas.db");
    let dsn = format!(
        "sqlite://{}?journal_mode=delete&busy_timeout=1234",
        db_path.to_string_lossy().replace('\\', "/")
    );

    let db = DbHandle::connect(&dsn, ConnectOpts::default()).await.unwrap();

    assert!(!db.dsn().contains("journal_mode"));
    assert_eq!(pragma_value(&db, "journal_mode").await.to_lowercase(), "delete");
    let pool = db.sqlx_sqlite().unwrap();
    let timeout: (i64,) = sqlx::query_as("PRAGMA busy_timeout")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(timeout.0, 1234);
}

#[tokio::test]
async fn test_unknown_scheme_is_rejected() {
    let err = DbHandle::connect("oracle://localhost/db", ConnectOpts::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown DSN"));
}
