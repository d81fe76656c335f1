pub mod artifacts;
pub mod auth;
pub mod chat;
pub mod error;
pub mod export;
pub mod gate;
pub mod status;
pub mod tool;

use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use astrea_domain::error::Error;

use crate::api::error::ApiError;
use crate::api::gate::request_id_from;
use crate::state::AppState;

/// Build the full API router.
///
/// `/health` and `/agent/status` are public; the agent endpoints
/// authenticate per request inside their handlers (each one needs a
/// different scope and rate bucket).
pub fn router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .route("/health", get(status::health))
        .route("/agent/status", get(status::status))
        .route("/agent/chat", post(chat::chat).fallback(method_not_allowed))
        .route("/agent/tool", post(tool::tool).fallback(method_not_allowed))
        .route(
            "/agent/export",
            post(export::export).fallback(method_not_allowed),
        )
        .route(
            "/agent/artifacts/:key",
            get(artifacts::get_artifact).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found(headers: HeaderMap) -> Response {
    ApiError::new(
        Error::NotFound("no such endpoint".into()),
        request_id_from(&headers),
    )
    .into_response()
}

async fn method_not_allowed(headers: HeaderMap) -> Response {
    ApiError::new(Error::MethodNotAllowed, request_id_from(&headers)).into_response()
}

/// Exact-origin CORS from config; a literal `"*"` allows all origins.
fn build_cors_layer(cors: &astrea_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    let allow_origin =
        if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
            tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
            AllowOrigin::any()
        } else {
            let exact: Vec<HeaderValue> = cors
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => Some(hv),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(exact)
        };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
