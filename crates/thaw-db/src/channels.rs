//! Channel catalog and the create/delete lifecycle spanning catalog, access
//! list and message log.
//!
//! Both lifecycle operations run in one transaction on the writer connection
//! and keep the step order below, so a database written without transactions
//! can only ever hold an inert orphan log, never a grant for a missing channel.

use rusqlite::{Connection, OptionalExtension};
use thaw_types::models::{ChannelEntry, User};

use crate::models::ChannelRow;
use crate::users::user_exists;
use crate::{Database, DbError, Result, acl, message_log};

fn stage_failed(channel: &str, stage: &'static str, err: DbError) -> DbError {
    match err {
        DbError::Sqlite(source) => DbError::CreationIncomplete {
            channel: channel.to_string(),
            stage,
            source,
        },
        other => other,
    }
}

pub(crate) fn query_channel(conn: &Connection, channel: &str) -> Result<Option<ChannelRow>> {
    let row = conn
        .query_row(
            "SELECT c.name, c.creator, u.password_hash
             FROM channels c
             LEFT JOIN users u ON u.name = c.creator
             WHERE c.name = ?1",
            [channel],
            |row| {
                Ok(ChannelRow {
                    name: row.get(0)?,
                    creator: row.get(1)?,
                    creator_hash: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

impl Database {
    /// Create a channel owned by `creator`:
    /// 1. create the message log (its prior existence means the name is taken),
    /// 2. record the catalog entry,
    /// 3. grant the creator access.
    pub fn create_channel(&self, channel: &str, creator: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            if message_log::relation_exists(&tx, channel)? {
                return Err(DbError::ChannelExists(channel.to_string()));
            }
            if !user_exists(&tx, creator)? {
                return Err(DbError::UnknownUser(creator.to_string()));
            }
            message_log::create_relation(&tx, channel)?;

            tx.execute(
                "INSERT INTO channels (name, creator) VALUES (?1, ?2)",
                (channel, creator),
            )
            .map_err(|e| {
                if crate::error::is_constraint_violation(&e) {
                    // Catalog row without a log: the name is still taken
                    DbError::ChannelExists(channel.to_string())
                } else {
                    stage_failed(channel, "catalog", e.into())
                }
            })?;

            acl::insert_grant(&tx, channel, creator)
                .map_err(|e| stage_failed(channel, "access list", e))?;

            tx.commit()
                .map_err(|e| stage_failed(channel, "commit", e.into()))?;
            Ok(())
        })
    }

    /// Delete a channel on behalf of its creator: every grant row one by one,
    /// then the catalog entry, then the message log. Returns `false` without
    /// touching anything if `creator` does not control the channel.
    pub fn delete_channel(&self, channel: &str, creator: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            if !acl::controls(&tx, channel, creator)? {
                return Ok(false);
            }

            for member in acl::members(&tx, channel)? {
                acl::delete_grant(&tx, channel, &member)?;
            }
            tx.execute(
                "DELETE FROM channels WHERE name = ?1 AND creator = ?2",
                (channel, creator),
            )?;
            message_log::drop_relation(&tx, channel)?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_channel(&self, channel: &str) -> Result<Option<ChannelEntry>> {
        self.with_conn(|conn| query_channel(conn, channel)?.map(ChannelRow::resolve).transpose())
    }

    /// Every catalog entry with its creator resolved. A creator without a
    /// credential row fails the whole listing.
    pub fn list_channels(&self) -> Result<Vec<ChannelEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.name, c.creator, u.password_hash
                 FROM channels c
                 LEFT JOIN users u ON u.name = c.creator
                 ORDER BY c.rowid",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChannelRow {
                        name: row.get(0)?,
                        creator: row.get(1)?,
                        creator_hash: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ChannelRow::resolve).collect()
        })
    }

    /// Channels `user` holds a grant for.
    pub fn channels_for(&self, user: &User) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel FROM chan_viewers WHERE member = ?1 ORDER BY channel",
            )?;
            let names = stmt
                .query_map([&user.name], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }
}
