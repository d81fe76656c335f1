//! `POST /agent/export` — render a sanitized payload to SVG and return a
//! signed, time-limited retrieval URL.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use astrea_domain::error::Error;
use astrea_domain::signing::{artifact_url, sign_artifact};

use crate::api::error::{ok_json, ApiError};
use crate::api::gate::{authorize, Endpoint};
use crate::runtime::export::{artifact_key, render_svg, sanitize_export};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ExportBody {
    #[serde(default)]
    title: Option<String>,
    safe_json: serde_json::Value,
}

pub async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let gate = match authorize(&state, &headers, Endpoint::Export) {
        Ok(gate) => gate,
        Err(e) => return e.into_response(),
    };
    let request_id = gate.request_id.clone();

    if body.len() > state.config.limits.chat_body_cap {
        return ApiError::new(
            Error::PayloadTooLarge(format!(
                "export body exceeds {} bytes",
                state.config.limits.chat_body_cap
            )),
            request_id,
        )
        .into_response();
    }

    let parsed: ExportBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return ApiError::new(
                Error::BadRequest(format!("invalid JSON body: {e}")),
                request_id,
            )
            .into_response()
        }
    };

    let sanitized = sanitize_export(parsed.title.as_deref(), &parsed.safe_json);
    let svg = render_svg(&sanitized);
    let key = artifact_key(&gate.ctx.user_id);

    if let Err(e) = state.objects.put(&key, svg.as_bytes()) {
        return ApiError::new(e, request_id).into_response();
    }

    let exp = chrono::Utc::now().timestamp() as u64 + state.config.artifacts.ttl_secs;
    let sig = sign_artifact(&state.config.artifacts.signing_key, &key, exp);
    let url = artifact_url(&state.config.server.public_origin, &key, exp, &sig);
    let expires_at = chrono::DateTime::from_timestamp(exp as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    ok_json(
        &request_id,
        json!({
            "key": key,
            "url": url,
            "expires_at": expires_at,
            "content_type": "image/svg+xml",
            "truncated": sanitized.truncated,
        }),
    )
}
