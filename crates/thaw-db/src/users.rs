//! Credential directory: accepted identities and their password hashes.

use rusqlite::{Connection, OptionalExtension};
use thaw_types::models::User;

use crate::error::is_constraint_violation;
use crate::{Database, DbError, Result};

impl Database {
    /// Register a new identity. Names are never reused.
    pub fn create_user(&self, name: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (name, password_hash) VALUES (?1, ?2)",
                (name, password_hash),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    DbError::DuplicateUser(name.to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_user(&self, name: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, name))
    }

    /// Every registered user, in registration order. Empty if none.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name, password_hash FROM users ORDER BY rowid")?;
            let users = stmt
                .query_map([], |row| Ok(User::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, name: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT name, password_hash FROM users WHERE name = ?1",
            [name],
            |row| Ok(User::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn user_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists)
}
