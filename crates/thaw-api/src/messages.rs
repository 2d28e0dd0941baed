use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use thaw_types::api::{MessageResponse, SendMessageRequest};
use thaw_types::models::{Message, User};

use crate::auth::AppState;
use crate::channels::live_channel;
use crate::error::blocking;

const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

fn to_response(message: Message) -> MessageResponse {
    MessageResponse {
        channel: message.channel,
        author: message.author.name,
        timestamp: message.timestamp,
        content: message.content,
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(user): Extension<User>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let channel = live_channel(&state, &name)?;
    let timestamp = chrono::Utc::now().timestamp_millis();

    let appended = blocking(&state, move |engine| {
        engine.append_message(&channel, &user, timestamp, &req.content)
    })
    .await?;

    if !appended {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(StatusCode::CREATED)
}

/// The last `limit` messages of a channel, oldest first. Only grant holders
/// may read.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<MessageQuery>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, StatusCode> {
    if query.limit == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let channel = live_channel(&state, &name)?;
    let limit = query.limit.min(MAX_LIMIT);

    let messages = blocking(&state, move |engine| {
        if !engine.has_access(channel.name(), &user)? {
            return Ok(None);
        }
        engine.read_messages(channel.name(), Some(limit)).map(Some)
    })
    .await?
    .ok_or(StatusCode::FORBIDDEN)?;

    let messages: Vec<MessageResponse> = messages.into_iter().map(to_response).collect();
    Ok(Json(messages))
}
