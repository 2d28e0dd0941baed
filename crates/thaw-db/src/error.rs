use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("channel already exists: {0}")]
    ChannelExists(String),
    #[error("reference to unknown user: {0}")]
    UnknownUser(String),
    /// The message log was created but a later step failed. The enclosing
    /// transaction has been rolled back.
    #[error("creation of channel {channel} failed at {stage}: {source}")]
    CreationIncomplete {
        channel: String,
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

pub type Result<T> = std::result::Result<T, DbError>;

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}
