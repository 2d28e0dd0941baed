//! Per-channel access list. A grant lets its holder view and post.

use rusqlite::Connection;
use thaw_types::models::AccessChange;

use crate::users::user_exists;
use crate::{Database, DbError, Result};

pub(crate) fn has_access(conn: &Connection, channel: &str, user: &str) -> Result<bool> {
    let granted = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM chan_viewers WHERE channel = ?1 AND member = ?2)",
        (channel, user),
        |row| row.get(0),
    )?;
    Ok(granted)
}

/// Control authority: `user` is the catalog creator and still holds its grant.
pub(crate) fn controls(conn: &Connection, channel: &str, user: &str) -> Result<bool> {
    let controls = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM channels c
            JOIN chan_viewers v ON v.channel = c.name AND v.member = c.creator
            WHERE c.name = ?1 AND c.creator = ?2
        )",
        (channel, user),
        |row| row.get(0),
    )?;
    Ok(controls)
}

pub(crate) fn members(conn: &Connection, channel: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT member FROM chan_viewers WHERE channel = ?1 ORDER BY rowid")?;
    let members = stmt
        .query_map([channel], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(members)
}

pub(crate) fn insert_grant(conn: &Connection, channel: &str, user: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO chan_viewers (channel, member) VALUES (?1, ?2)",
        (channel, user),
    )?;
    Ok(())
}

pub(crate) fn delete_grant(conn: &Connection, channel: &str, user: &str) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM chan_viewers WHERE channel = ?1 AND member = ?2",
        (channel, user),
    )?;
    Ok(removed)
}

impl Database {
    pub fn has_access(&self, channel: &str, user: &str) -> Result<bool> {
        self.with_conn(|conn| has_access(conn, channel, user))
    }

    pub fn can_control(&self, channel: &str, user: &str) -> Result<bool> {
        self.with_conn(|conn| controls(conn, channel, user))
    }

    /// Every grant holder of a channel, creator first.
    pub fn channel_members(&self, channel: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| members(conn, channel))
    }

    /// Grant `target` access if `requester` controls the channel and `target`
    /// does not already hold a grant.
    pub fn grant_access(&self, channel: &str, target: &str, requester: &str) -> Result<AccessChange> {
        self.with_conn_mut(|conn| {
            if !controls(conn, channel, requester)? {
                return Ok(AccessChange::Denied);
            }
            if !user_exists(conn, target)? {
                return Err(DbError::UnknownUser(target.to_string()));
            }
            if has_access(conn, channel, target)? {
                return Ok(AccessChange::Unchanged);
            }
            insert_grant(conn, channel, target)?;
            Ok(AccessChange::Applied)
        })
    }

    /// Remove exactly one non-creator grant. The creator's own grant is only
    /// removed by deleting the channel.
    pub fn revoke_access(&self, channel: &str, target: &str, requester: &str) -> Result<AccessChange> {
        self.with_conn_mut(|conn| {
            if !controls(conn, channel, requester)? {
                return Ok(AccessChange::Denied);
            }
            if target == requester {
                return Ok(AccessChange::Unchanged);
            }
            match delete_grant(conn, channel, target)? {
                0 => Ok(AccessChange::Unchanged),
                _ => Ok(AccessChange::Applied),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (name, hash) in [("alice", "hashA"), ("bob", "hashB"), ("carol", "hashC")] {
            db.create_user(name, hash).unwrap();
        }
        db.create_channel("general", "alice").unwrap();
        db
    }

    #[test]
    fn creator_holds_control() {
        let db = setup();
        assert!(db.has_access("general", "alice").unwrap());
        assert!(db.can_control("general", "alice").unwrap());
        assert!(!db.can_control("general", "bob").unwrap());
        assert_eq!(db.channel_members("general").unwrap(), ["alice"]);
    }

    #[test]
    fn grant_is_idempotent() {
        let db = setup();
        assert_eq!(db.grant_access("general", "bob", "alice").unwrap(), AccessChange::Applied);
        assert_eq!(db.grant_access("general", "bob", "alice").unwrap(), AccessChange::Unchanged);
        assert!(db.has_access("general", "bob").unwrap());
        assert_eq!(db.channel_members("general").unwrap(), ["alice", "bob"]);
    }

    #[test]
    fn only_the_creator_grants_and_revokes() {
        let db = setup();
        db.grant_access("general", "bob", "alice").unwrap();

        assert_eq!(db.grant_access("general", "carol", "bob").unwrap(), AccessChange::Denied);
        assert!(!db.has_access("general", "carol").unwrap());

        assert_eq!(db.revoke_access("general", "alice", "bob").unwrap(), AccessChange::Denied);
        assert!(db.has_access("general", "alice").unwrap());
    }

    #[test]
    fn revoke_removes_exactly_one_grant() {
        let db = setup();
        db.grant_access("general", "bob", "alice").unwrap();
        db.grant_access("general", "carol", "alice").unwrap();

        assert_eq!(db.revoke_access("general", "bob", "alice").unwrap(), AccessChange::Applied);
        assert!(!db.has_access("general", "bob").unwrap());
        assert!(db.has_access("general", "carol").unwrap());
        assert_eq!(db.revoke_access("general", "bob", "alice").unwrap(), AccessChange::Unchanged);
    }

    #[test]
    fn granting_an_unregistered_user_is_an_integrity_error() {
        let db = setup();
        let err = db.grant_access("general", "mallory", "alice").unwrap_err();
        assert!(matches!(err, DbError::UnknownUser(name) if name == "mallory"));
    }
}
