//! User MCP Tools
//!
//! Tools for managing the owners of catalogs, diets and meals.

use serde::Serialize;

use crate::db::Database;
use crate::models::User;

/// Response for list_users
#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<User>,
    pub limit: i64,
    pub offset: i64,
}

/// Create a new user
pub fn create_user(db: &Database, login: &str, is_admin: bool) -> Result<User, String> {
    let login = login.trim();
    if login.is_empty() {
        return Err("Login cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let existing = User::get_by_login(&conn, login)
        .map_err(|e| format!("Database error: {}", e))?;
    if existing.is_some() {
        return Err(format!("User with login '{}' already exists", login));
    }

    let user = User::create(&conn, login, is_admin)
        .map_err(|e| format!("Failed to create user: {}", e))?;

    tracing::info!("Created user {} ({})", user.id, user.login);
    Ok(user)
}

/// List users with pagination
pub fn list_users(db: &Database, limit: i64, offset: i64) -> Result<ListUsersResponse, String> {
    let limit = limit.min(500).max(1);
    let offset = offset.max(0);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let users = User::list(&conn, limit, offset)
        .map_err(|e| format!("Failed to list users: {}", e))?;

    Ok(ListUsersResponse { users, limit, offset })
}

/// Fail unless the user exists
pub(crate) fn require_user(conn: &rusqlite::Connection, user_id: i64) -> Result<User, String> {
    User::get_by_id(conn, user_id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("User not found with id: {}", user_id))
}
