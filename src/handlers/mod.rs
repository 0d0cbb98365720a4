use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::database::cards::CardStore;
use crate::database::users::UserStore;
use crate::session::SessionManager;

pub mod auth;
pub mod cards;

pub struct AppState {
    pub pool: PgPool,
    pub users: UserStore,
    pub cards: CardStore,
    pub sessions: SessionManager,
    pub api: ApiConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/whoami", get(auth::whoami))
        .route("/cards", get(cards::list).post(cards::create))
        .route("/cards/search", get(cards::search))
        .route(
            "/cards/:id",
            get(cards::get).patch(cards::update).delete(cards::remove),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::session::resolve_session,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Cardbox API",
            "version": version,
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/register, /auth/login, /auth/refresh, /auth/logout (public)",
                "whoami": "/auth/whoami (protected)",
                "cards": "/cards[/:id] (protected)",
                "search": "/cards/search?q= (protected)",
            }
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match crate::database::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": { "status": "degraded", "timestamp": now, "database_error": e.to_string() }
            })),
        ),
    }
}
