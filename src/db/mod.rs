//! Database module
//!
//! Handles SQLite connection and migrations.

pub mod connection;
pub mod migrations;

pub use connection::{Database, DbError, DbResult};

/// Open an in-memory database with the schema applied, for tests
#[cfg(test)]
pub(crate) fn test_connection() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    migrations::run_migrations(&conn).unwrap();
    conn
}

/// Pooled database backed by a private shared-cache in-memory SQLite, for tests
#[cfg(test)]
pub(crate) fn test_database() -> Database {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let uri = format!(
        "file:ration_test_{}_{}?mode=memory&cache=shared",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    );

    let db = Database::new(uri).unwrap();
    db.with_conn(migrations::run_migrations).unwrap();
    db
}
