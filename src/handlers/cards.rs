use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::{Card, CardContent, CardMeta};
use crate::error::ApiError;
use crate::filter::{ListParams, ListQuery};
use crate::middleware::session::CurrentUser;

use super::AppState;

/// Create/update payload: content fields plus optional category and tags
#[derive(Debug, Default, Deserialize)]
pub struct CardPayload {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl CardPayload {
    fn split(self) -> (CardContent, CardMeta) {
        (
            CardContent {
                title: self.title,
                subtitle: self.subtitle,
                content: self.content,
            },
            CardMeta {
                category: self.category,
                tags: self.tags,
            },
        )
    }
}

/// GET /cards - filtered, sorted listing of the caller's cards
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Card>>, ApiError> {
    let params = ListParams::from_query(query, state.api.default_page_size, state.api.max_page_size)?;
    let cards = state.cards.list(current.id, &params).await?;
    Ok(Json(cards))
}

/// GET /cards/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
) -> Result<Json<Card>, ApiError> {
    let card = state.cards.get_by_id(card_id, current.id).await?;
    Ok(Json(card))
}

/// POST /cards
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CardPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let (content, meta) = payload.split();
    let card = state.cards.create(current.id, content, meta).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// PATCH /cards/:id - partial update; absent fields stay untouched
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
    Json(payload): Json<CardPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (content, meta) = payload.split();
    let updated = state.cards.update(card_id, current.id, content, meta).await?;
    if updated {
        Ok(Json(json!({ "updated": true })))
    } else {
        Err(ApiError::not_found("card not found"))
    }
}

/// DELETE /cards/:id - returns the deleted card's last known state
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
) -> Result<Json<Card>, ApiError> {
    let card = state.cards.delete(card_id, current.id).await?;
    Ok(Json(card))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// GET /cards/search?q= - substring search across content and relations
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Card>>, ApiError> {
    if query.q.is_empty() {
        return Err(ApiError::bad_request("search query must not be empty"));
    }
    if query.q.chars().count() > state.api.max_search_len {
        return Err(ApiError::bad_request(format!(
            "search query exceeds {} characters",
            state.api.max_search_len
        )));
    }

    let cards = state.cards.search(&query.q, current.id).await?;
    Ok(Json(cards))
}
