//! `GET /agent/artifacts/:key` — signature-only artifact retrieval.
//!
//! Authorization is the HMAC alone; there is no user lookup. Abuse
//! control is per-IP.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use astrea_domain::error::Error;
use astrea_domain::signing::verify_artifact;

use crate::api::error::{set_request_id, ApiError};
use crate::api::gate::{check_bucket, client_ip, request_id_from};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ArtifactQuery {
    #[serde(default)]
    exp: Option<String>,
    #[serde(default)]
    sig: Option<String>,
}

pub async fn get_artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ArtifactQuery>,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id_from(&headers);
    state.metrics.record_request();

    let ip = client_ip(&headers);
    if let Err(e) = check_bucket(&state, &state.rates.artifact, &ip, &request_id) {
        return e.into_response();
    }
    let permit = state.inflight.acquire(
        &format!("artifact:{ip}"),
        state.config.limits.concurrency.artifact,
    );
    let Some(_permit) = permit else {
        state.metrics.record_rate_limited();
        return ApiError::new(Error::RateLimited { retry_after: 1 }, request_id).into_response();
    };

    let (Some(exp_raw), Some(sig)) = (params.exp, params.sig) else {
        return ApiError::new(
            Error::BadRequest("exp and sig query params are required".into()),
            request_id,
        )
        .into_response();
    };
    let Ok(exp) = exp_raw.parse::<u64>() else {
        return ApiError::new(Error::BadRequest("exp must be unix seconds".into()), request_id)
            .into_response();
    };

    let now = chrono::Utc::now().timestamp() as u64;
    if !verify_artifact(&state.config.artifacts.signing_key, &key, exp, &sig, now) {
        return ApiError::new(
            Error::Forbidden("invalid or expired signature".into()),
            request_id,
        )
        .into_response();
    }

    match state.objects.get(&key) {
        Ok(Some(bytes)) => {
            let mut resp = (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/svg+xml")],
                bytes,
            )
                .into_response();
            set_request_id(&mut resp, &request_id);
            resp
        }
        Ok(None) => {
            ApiError::new(Error::NotFound("artifact not found".into()), request_id)
                .into_response()
        }
        Err(e) => ApiError::new(e, request_id).into_response(),
    }
}
