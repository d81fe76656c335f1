//! Public probes: `GET /health` and `GET /agent/status`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::json;

use crate::api::error::ok_json;
use crate::api::gate::request_id_from;
use crate::state::AppState;

pub async fn health(headers: HeaderMap) -> Response {
    ok_json(&request_id_from(&headers), json!({ "ok": true }))
}

/// Service metadata: environment, model ids, which bindings are present,
/// and process-wide counters. Reports a missing persistence binding
/// instead of failing so probes can surface the misconfiguration.
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = request_id_from(&headers);
    state.metrics.record_request();

    ok_json(
        &request_id,
        json!({
            "service": "astrea-gateway",
            "environment": state.config.environment,
            "models": {
                "chat": state.config.llm.chat_model,
                "embedding": state.config.llm.embedding_model,
            },
            "bindings": {
                "persistence": state.store.is_some(),
                "vector_index": state.vector.is_some(),
                "backend": state.config.backend.base_url,
            },
            "actors_active": state.actors.active_count(),
            "counters": state.metrics.snapshot(),
        }),
    )
}
