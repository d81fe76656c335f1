//! `POST /agent/tool` — invoke the sandboxed natal export tool.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use astrea_domain::error::Error;

use crate::api::error::{ok_json, ApiError};
use crate::api::gate::{authorize, Endpoint};
use crate::runtime::agent::ActorRequest;
use crate::state::AppState;

pub async fn tool(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let gate = match authorize(&state, &headers, Endpoint::Tool) {
        Ok(gate) => gate,
        Err(e) => return e.into_response(),
    };
    let request_id = gate.request_id.clone();

    if body.len() > state.config.limits.tool_body_cap {
        return ApiError::new(
            Error::PayloadTooLarge(format!(
                "tool body exceeds {} bytes",
                state.config.limits.tool_body_cap
            )),
            request_id,
        )
        .into_response();
    }

    if state.config.is_production() && state.store.is_none() {
        return ApiError::new(
            Error::MissingBinding("persistence binding is required in production".into()),
            request_id,
        )
        .into_response();
    }

    let req = ActorRequest {
        request_id: request_id.clone(),
        memory_allowed: gate.ctx.memory_allowed,
        tools_allowed: gate.ctx.tools_allowed,
        body: body.to_vec(),
    };

    let actor = state.actors.get_or_create(&gate.ctx.user_id);
    let mut agent = actor.lock().await;
    match agent.handle_tool(&state, &req).await {
        Ok(safe) => ok_json(&request_id, safe),
        Err(e) => {
            tracing::warn!(
                user = %astrea_domain::ids::user_hash(&gate.ctx.user_id),
                request_id = %request_id,
                code = e.code(),
                "tool invocation failed"
            );
            ApiError::new(e, request_id).into_response()
        }
    }
}
