use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use thaw_core::AccessEngine;
use thaw_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest};
use thaw_types::models::{Participant, User};
use thaw_types::validation::is_valid_username;

use crate::error::blocking;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: AccessEngine,
    pub jwt_secret: String,
    /// Channel joined on login when the user holds access to it.
    pub default_channel: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() > 32 || !is_valid_username(&req.username) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let username = req.username;
    let user = blocking(&state, move |engine| engine.register(&username, &password_hash)).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let username = req.username.clone();
    let user = blocking(&state, move |engine| engine.find_user(&username))
        .await?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = create_token(&state.jwt_secret, &user.name).map_err(|e| {
        error!("Token creation failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let default_channel = state.default_channel.clone();
    let joiner = user.clone();
    let channel = blocking(&state, move |engine| {
        let Some(channel) = engine.lookup(&default_channel) else {
            return Ok(None);
        };
        let connected = engine.connect(&channel, &joiner)?
            || channel.is_connected(&Participant::Human(joiner));
        Ok(connected.then(|| channel.name().to_string()))
    })
    .await?;

    info!("User {} logged in", user.name);
    Ok(Json(LoginResponse {
        username: user.name,
        token,
        channel,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, StatusCode> {
    let left = blocking(&state, move |engine| Ok(engine.disconnect(&user))).await?;
    Ok(Json(left))
}

pub(crate) fn create_token(secret: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
