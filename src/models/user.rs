//! User model
//!
//! Owners of groceries, dishes, diets and meals. The user row carries the
//! pointer to the single selected diet.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::Diet;
use crate::db::{DbError, DbResult};

/// An application user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub is_admin: bool,
    pub selected_diet_id: Option<i64>,
    pub created_at: String,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            login: row.get("login")?,
            is_admin: row.get::<_, i32>("is_admin")? != 0,
            selected_diet_id: row.get("selected_diet_id")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a user with a unique login
    pub fn create(conn: &Connection, login: &str, is_admin: bool) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO users (login, is_admin) VALUES (?1, ?2)",
            params![login, is_admin as i32],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "User", id })
    }

    /// Get a user by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by login
    pub fn get_by_login(conn: &Connection, login: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM users WHERE login = ?1")?;

        let result = stmt.query_row([login], Self::from_row);
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List users ordered by login
    pub fn list(conn: &Connection, limit: i64, offset: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY login ASC LIMIT ?1 OFFSET ?2")?;
        let users = stmt
            .query_map(params![limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Point the user's selection at `diet_id`, or clear it with `None`.
    ///
    /// Selecting replaces any previous selection, so a user never has more
    /// than one selected diet. The diet must belong to the user.
    pub fn select_diet(conn: &Connection, user_id: i64, diet_id: Option<i64>) -> DbResult<Self> {
        if let Some(diet_id) = diet_id {
            let owner: Option<i64> = match conn.query_row(
                "SELECT user_id FROM diets WHERE id = ?1",
                [diet_id],
                |row| row.get(0),
            ) {
                Ok(owner) => Some(owner),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };

            if owner != Some(user_id) {
                return Err(DbError::NotFound { entity: "Diet", id: diet_id });
            }
        }

        let rows = conn.execute(
            "UPDATE users SET selected_diet_id = ?1 WHERE id = ?2",
            params![diet_id, user_id],
        )?;
        if rows == 0 {
            return Err(DbError::NotFound { entity: "User", id: user_id });
        }

        Self::get_by_id(conn, user_id)?.ok_or(DbError::NotFound { entity: "User", id: user_id })
    }

    /// The user's selected diet, if any
    pub fn selected_diet(conn: &Connection, user_id: i64) -> DbResult<Option<Diet>> {
        let user = Self::get_by_id(conn, user_id)?
            .ok_or(DbError::NotFound { entity: "User", id: user_id })?;

        match user.selected_diet_id {
            Some(diet_id) => Diet::get_by_id(conn, diet_id),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::DietCreate;

    fn diet(conn: &Connection, user_id: i64, name: &str) -> Diet {
        Diet::create(
            conn,
            &DietCreate { user_id, name: name.to_string(), entries: vec![] },
        )
        .unwrap()
    }

    #[test]
    fn test_selecting_replaces_previous_selection() {
        let conn = test_connection();
        let user = User::create(&conn, "irina", false).unwrap();
        let first = diet(&conn, user.id, "First");
        let second = diet(&conn, user.id, "Second");

        User::select_diet(&conn, user.id, Some(first.id)).unwrap();
        let user_now = User::select_diet(&conn, user.id, Some(second.id)).unwrap();
        assert_eq!(user_now.selected_diet_id, Some(second.id));

        assert!(!Diet::get_by_id(&conn, first.id).unwrap().unwrap().selected);
        assert!(Diet::get_by_id(&conn, second.id).unwrap().unwrap().selected);

        let cleared = User::select_diet(&conn, user.id, None).unwrap();
        assert_eq!(cleared.selected_diet_id, None);
        assert!(User::selected_diet(&conn, user.id).unwrap().is_none());
    }

    #[test]
    fn test_cannot_select_foreign_diet() {
        let conn = test_connection();
        let owner = User::create(&conn, "kira", false).unwrap();
        let other = User::create(&conn, "lev", false).unwrap();
        let plan = diet(&conn, owner.id, "Owner plan");

        let result = User::select_diet(&conn, other.id, Some(plan.id));
        assert!(matches!(result, Err(DbError::NotFound { entity: "Diet", .. })));
    }

    #[test]
    fn test_deleting_selected_diet_clears_selection() {
        let conn = test_connection();
        let user = User::create(&conn, "mila", false).unwrap();
        let plan = diet(&conn, user.id, "Plan");
        User::select_diet(&conn, user.id, Some(plan.id)).unwrap();

        assert!(Diet::delete(&conn, plan.id).unwrap());
        let user = User::get_by_id(&conn, user.id).unwrap().unwrap();
        assert_eq!(user.selected_diet_id, None);
    }

    #[test]
    fn test_login_is_unique() {
        let conn = test_connection();
        User::create(&conn, "nina", false).unwrap();
        assert!(User::create(&conn, "nina", true).is_err());
        assert!(User::get_by_login(&conn, "nina").unwrap().is_some());
    }
}
