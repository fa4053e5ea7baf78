//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("Applied schema migration v1");
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- USERS
        -- selected_diet_id is the single "current plan" pointer
        -- ============================================
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            login TEXT NOT NULL UNIQUE,
            is_admin INTEGER NOT NULL DEFAULT 0,
            selected_diet_id INTEGER REFERENCES diets(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- GROCERIES
        -- Macro profile per 100 grams; user_id NULL = shared
        -- ============================================
        CREATE TABLE groceries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            proteins REAL NOT NULL DEFAULT 0 CHECK(proteins >= 0),
            fats REAL NOT NULL DEFAULT 0 CHECK(fats >= 0),
            carbohydrates REAL NOT NULL DEFAULT 0 CHECK(carbohydrates >= 0),
            is_liquid INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_groceries_user ON groceries(user_id);
        CREATE INDEX idx_groceries_name ON groceries(name);

        -- ============================================
        -- DISHES
        -- ============================================
        CREATE TABLE dishes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_dishes_user ON dishes(user_id);

        CREATE TABLE dish_groceries (
            dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
            grocery_id INTEGER NOT NULL REFERENCES groceries(id) ON DELETE RESTRICT,
            amount REAL NOT NULL CHECK(amount > 0),   -- grams
            PRIMARY KEY (dish_id, grocery_id)
        );

        CREATE INDEX idx_dish_groceries_grocery ON dish_groceries(grocery_id);

        -- ============================================
        -- DIETS
        -- Timed dish schedules
        -- ============================================
        CREATE TABLE diets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_diets_user ON diets(user_id);

        CREATE TABLE diet_dishes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            diet_id INTEGER NOT NULL REFERENCES diets(id) ON DELETE CASCADE,
            dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
            amount REAL NOT NULL CHECK(amount > 0),   -- grams
            time TEXT NOT NULL                        -- "HH:MM"
        );

        CREATE INDEX idx_diet_dishes_diet ON diet_dishes(diet_id);
        CREATE INDEX idx_diet_dishes_dish ON diet_dishes(dish_id);

        -- ============================================
        -- MEALS
        -- What was actually eaten; nutrition is derived at read time
        -- ============================================
        CREATE TABLE meals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
            amount REAL NOT NULL CHECK(amount > 0),   -- grams
            eaten_at TEXT NOT NULL,                   -- RFC 3339, UTC
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_meals_user_eaten ON meals(user_id, eaten_at);
        CREATE INDEX idx_meals_dish ON meals(dish_id);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(!needs_migration(&conn).unwrap());
    }
}
