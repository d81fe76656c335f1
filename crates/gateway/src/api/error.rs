//! Wire-level error and response helpers.
//!
//! Every response, success or error, carries `x-request-id`; every error
//! body is `{error, code, requestId}` and 429s add `retry-after`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use astrea_domain::Error;

pub struct ApiError {
    pub error: Error,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: Error, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.error.to_string(),
            "code": self.error.code(),
            "requestId": self.request_id,
        }));

        let mut resp = (status, body).into_response();
        set_request_id(&mut resp, &self.request_id);
        if let Error::RateLimited { retry_after } = self.error {
            if let Ok(value) = retry_after.to_string().parse() {
                resp.headers_mut().insert("retry-after", value);
            }
        }
        resp
    }
}

/// 200 JSON response with the request id attached.
pub fn ok_json(request_id: &str, body: serde_json::Value) -> Response {
    let mut resp = Json(body).into_response();
    set_request_id(&mut resp, request_id);
    resp
}

pub fn set_request_id(resp: &mut Response, request_id: &str) {
    if let Ok(value) = request_id.parse() {
        resp.headers_mut().insert("x-request-id", value);
    }
}
