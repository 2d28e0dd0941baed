use axum::http::StatusCode;
use thaw_core::{AccessEngine, CoreError};
use thaw_types::models::AccessChange;
use tracing::{error, warn};

use crate::auth::AppState;

/// Map a core failure onto the status the client sees.
pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::DuplicateUser(_) | CoreError::ChannelAlreadyExists(_) => StatusCode::CONFLICT,
        CoreError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::ChannelBusy(_) => StatusCode::CONFLICT,
        CoreError::ChannelCreationIncomplete { .. } | CoreError::IntegrityViolation(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Status for an access-list change that did not fail.
pub fn status_for_change(change: AccessChange, applied: StatusCode) -> StatusCode {
    match change {
        AccessChange::Applied => applied,
        AccessChange::Unchanged => StatusCode::OK,
        AccessChange::Denied => StatusCode::FORBIDDEN,
    }
}

/// Run a core operation on a blocking worker; SQLite calls must not run on
/// the async executor.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&AccessEngine) -> thaw_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.engine))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            if e.is_fatal() {
                error!("Core operation failed: {}", e);
            } else {
                warn!("Core operation refused: {}", e);
            }
            status_for(&e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thaw_db::DbError;

    #[test]
    fn business_outcomes_are_client_errors() {
        assert_eq!(status_for(&CoreError::DuplicateUser("a".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&CoreError::ChannelNotFound("a".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&CoreError::ChannelBusy("a".into())), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_and_integrity_are_server_errors() {
        assert_eq!(
            status_for(&CoreError::StorageUnavailable(DbError::LockPoisoned)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&CoreError::IntegrityViolation("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn refusals_become_forbidden() {
        assert_eq!(status_for_change(AccessChange::Denied, StatusCode::CREATED), StatusCode::FORBIDDEN);
        assert_eq!(status_for_change(AccessChange::Unchanged, StatusCode::CREATED), StatusCode::OK);
        assert_eq!(status_for_change(AccessChange::Applied, StatusCode::CREATED), StatusCode::CREATED);
    }
}
