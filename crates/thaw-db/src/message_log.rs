//! Per-channel append-only message logs.
//!
//! Every channel owns one relation named `log:<channel>`. Its existence is the
//! uniqueness guard used when a channel is created, and it is dropped last when
//! the channel is deleted. Reads tolerate a missing relation.

use rusqlite::{Connection, OptionalExtension};
use thaw_types::models::Message;

use crate::acl::has_access;
use crate::models::MessageRow;
use crate::{Database, Result};

fn relation_name(channel: &str) -> String {
    format!("log:{}", channel)
}

/// Quoted identifier for a channel's log relation.
fn quoted(channel: &str) -> String {
    format!("\"{}\"", relation_name(channel).replace('"', "\"\""))
}

pub(crate) fn relation_exists(conn: &Connection, channel: &str) -> Result<bool> {
    // SQLite identifiers are case-insensitive, so the check must be too
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
        [relation_name(channel)],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn create_relation(conn: &Connection, channel: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE {} (
            seq         INTEGER PRIMARY KEY,
            timestamp   INTEGER NOT NULL CHECK (timestamp > 0),
            content     TEXT NOT NULL,
            author      TEXT NOT NULL
        );",
        quoted(channel)
    ))?;
    Ok(())
}

pub(crate) fn drop_relation(conn: &Connection, channel: &str) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quoted(channel)))?;
    Ok(())
}

impl Database {
    pub fn log_exists(&self, channel: &str) -> Result<bool> {
        self.with_conn(|conn| relation_exists(conn, channel))
    }

    /// Append one record if `author` currently holds access to `channel`.
    /// Returns whether a record was written.
    pub fn append_message(
        &self,
        channel: &str,
        author: &str,
        timestamp: i64,
        content: &str,
    ) -> Result<bool> {
        if timestamp <= 0 {
            return Ok(false);
        }
        self.with_conn_mut(|conn| {
            if !has_access(conn, channel, author)? || !relation_exists(conn, channel)? {
                return Ok(false);
            }
            conn.execute(
                &format!(
                    "INSERT INTO {} (timestamp, content, author) VALUES (?1, ?2, ?3)",
                    quoted(channel)
                ),
                rusqlite::params![timestamp, content, author],
            )?;
            Ok(true)
        })
    }

    /// The last `limit` messages of a channel, oldest first, or the whole log
    /// when `limit` is `None`. A missing log reads as empty.
    ///
    /// Messages carry the catalog spelling of the channel name, whatever case
    /// the caller used. An orphan log without a catalog entry keeps the
    /// caller's spelling.
    pub fn read_messages(&self, channel: &str, limit: Option<u32>) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            if !relation_exists(conn, channel)? {
                return Ok(Vec::new());
            }
            let catalog_name: Option<String> = conn
                .query_row("SELECT name FROM channels WHERE name = ?1", [channel], |row| {
                    row.get(0)
                })
                .optional()?;
            let channel = catalog_name.as_deref().unwrap_or(channel);

            // JOIN users to resolve authors in a single query
            let mut stmt = conn.prepare(&format!(
                "SELECT m.timestamp, m.content, m.author, u.password_hash
                 FROM {} m
                 LEFT JOIN users u ON u.name = m.author
                 ORDER BY m.seq DESC
                 LIMIT ?1",
                quoted(channel)
            ))?;

            // LIMIT -1 means no limit in SQLite
            let limit = limit.map_or(-1, i64::from);
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(MessageRow {
                        timestamp: row.get(0)?,
                        content: row.get(1)?,
                        author: row.get(2)?,
                        author_hash: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .rev()
                .map(|row| row.resolve(channel))
                .collect()
        })
    }
}
