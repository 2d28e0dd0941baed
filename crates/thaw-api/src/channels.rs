use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use thaw_core::Channel;
use thaw_types::api::{ChannelResponse, ConnectRequest, CreateChannelRequest, GrantRequest};
use thaw_types::models::{Participant, User};
use thaw_types::validation::normalize_channel_name;

use crate::auth::AppState;
use crate::error::{blocking, status_for, status_for_change};

/// Resolve a live channel by name. Registry lookups are in-memory and run
/// on the async thread.
pub(crate) fn live_channel(state: &AppState, name: &str) -> Result<Arc<Channel>, StatusCode> {
    state.engine.channel(name).map_err(|e| status_for(&e))
}

async fn resolve_user(state: &AppState, name: String) -> Result<User, StatusCode> {
    blocking(state, move |engine| engine.find_user(&name))
        .await?
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn list_channels(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let entries = blocking(&state, |engine| engine.list_channels()).await?;

    let channels: Vec<ChannelResponse> = entries
        .into_iter()
        .map(|entry| ChannelResponse {
            name: entry.name,
            creator: entry.creator.name,
        })
        .collect();

    Ok(Json(channels))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = normalize_channel_name(&req.name).ok_or(StatusCode::BAD_REQUEST)?;

    let channel = blocking(&state, move |engine| engine.create_channel(&user, &name)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ChannelResponse {
            name: channel.name().to_string(),
            creator: channel.creator_name().to_string(),
        }),
    ))
}

/// Owner self-revocation: deletes the channel and everything it owns.
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, StatusCode> {
    let channel = live_channel(&state, &name)?;

    let change = blocking(&state, move |engine| engine.revoke_access(&channel, &user, &user)).await?;

    Ok(status_for_change(change, StatusCode::NO_CONTENT))
}

/// Join a channel, optionally leaving another one in the same step.
pub async fn connect(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(user): Extension<User>,
    Json(req): Json<ConnectRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let to = live_channel(&state, &name)?;
    let from = req
        .from
        .as_deref()
        .map(|from| live_channel(&state, from))
        .transpose()?;

    if to.is_connected(&Participant::Human(user.clone())) {
        return Err(StatusCode::CONFLICT);
    }

    let joined = blocking(&state, move |engine| match from {
        Some(from) => engine.switch_channel(&user, &from, &to),
        None => engine.connect(&to, &user),
    })
    .await?;

    if !joined {
        warn!("Connect to channel '{}' refused", name);
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(StatusCode::OK)
}

pub async fn participants(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let channel = live_channel(&state, &name)?;
    Ok(Json(channel.participants()))
}

pub async fn grant_access(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(user): Extension<User>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let channel = live_channel(&state, &name)?;
    let target = resolve_user(&state, req.username).await?;

    let change = blocking(&state, move |engine| engine.grant_access(&channel, &target, &user)).await?;

    Ok(status_for_change(change, StatusCode::CREATED))
}

pub async fn revoke_access(
    State(state): State<AppState>,
    Path((name, member)): Path<(String, String)>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, StatusCode> {
    let channel = live_channel(&state, &name)?;
    let target = resolve_user(&state, member).await?;

    let change = blocking(&state, move |engine| engine.revoke_access(&channel, &target, &user)).await?;

    Ok(status_for_change(change, StatusCode::NO_CONTENT))
}
