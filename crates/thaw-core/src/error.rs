use thaw_db::DbError;
use thiserror::Error;

/// Failure kinds surfaced to callers. Authorization refusals are not errors;
/// see [`thaw_types::models::AccessChange`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("channel already exists: {0}")]
    ChannelAlreadyExists(String),
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    /// Not retried. The failed steps were rolled back.
    #[error("creation of channel {channel} failed at {stage}")]
    ChannelCreationIncomplete { channel: String, stage: &'static str },
    #[error("channel {0} still has connected participants")]
    ChannelBusy(String),
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] DbError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateUser(name) => Self::DuplicateUser(name),
            DbError::ChannelExists(name) => Self::ChannelAlreadyExists(name),
            DbError::UnknownUser(name) => {
                Self::IntegrityViolation(format!("reference to unregistered user {name}"))
            }
            DbError::CreationIncomplete { channel, stage, .. } => {
                Self::ChannelCreationIncomplete { channel, stage }
            }
            err @ (DbError::Sqlite(_) | DbError::LockPoisoned) => Self::StorageUnavailable(err),
        }
    }
}

impl CoreError {
    /// Integrity and storage failures abort the caller's operation; the rest
    /// are routine business outcomes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IntegrityViolation(_) | Self::StorageUnavailable(_))
    }
}
