use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (credentials, catalog, access list)");
        // Message logs are created per channel at runtime, see message_log.rs
        conn.execute_batch(
            "
            CREATE TABLE users (
                name            TEXT PRIMARY KEY,
                password_hash   TEXT NOT NULL
            );

            CREATE TABLE channels (
                name        TEXT PRIMARY KEY COLLATE NOCASE,
                creator     TEXT NOT NULL REFERENCES users(name)
            );

            CREATE TABLE chan_viewers (
                channel     TEXT NOT NULL COLLATE NOCASE REFERENCES channels(name),
                member      TEXT NOT NULL REFERENCES users(name),
                PRIMARY KEY (channel, member)
            );

            CREATE INDEX idx_chan_viewers_member ON chan_viewers(member);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
