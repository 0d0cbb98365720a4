use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::session::{
    attach_access_cookies, attach_refresh_cookie, clear_session_cookies, cookie_value, CurrentUser,
};
use crate::session::TokenLocation;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// POST /auth/register - create a user account
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::bad_request("invalid email format"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    let user = state.users.register(username, &payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// POST /auth/login - verify credentials and issue a fresh session
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = state.users.authenticate(&payload.username, &payload.password).await?;
    let pair = state.sessions.issue_pair(user.id)?;

    let mut response = Json(TokenResponse {
        access_token: pair.access.token.clone(),
        token_type: "bearer",
    })
    .into_response();

    if state.sessions.config().location == TokenLocation::Cookies {
        attach_access_cookies(state.sessions.config(), &mut response, &pair.access);
        attach_refresh_cookie(state.sessions.config(), &mut response, &pair.refresh);
    }
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /auth/refresh - exchange a refresh token for a new access token.
/// The token may arrive in the body or as the refresh cookie.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Response, ApiError> {
    let config = state.sessions.config();
    let raw = payload
        .and_then(|Json(p)| p.refresh_token)
        .or_else(|| cookie_value(&headers, &config.refresh_cookie))
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?;

    let issued = state.sessions.refresh_access(&raw)?;

    let mut response = Json(TokenResponse {
        access_token: issued.token.clone(),
        token_type: "bearer",
    })
    .into_response();

    if config.location == TokenLocation::Cookies {
        attach_access_cookies(config, &mut response, &issued);
    }
    Ok(response)
}

/// POST /auth/logout - tokens are stateless, so clearing the cookies is the
/// whole logout. Idempotent.
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let mut response = Json(serde_json::json!({ "success": true })).into_response();
    clear_session_cookies(state.sessions.config(), &mut response);
    response
}

/// GET /auth/whoami - the authenticated user's own record
pub async fn whoami(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get_by_id(current.id).await?;
    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}
