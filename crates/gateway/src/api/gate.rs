//! Per-request admission: request id, authentication, scope check,
//! rate buckets, concurrency slot.
//!
//! Order matters: the per-IP bucket is drained before the per-user
//! endpoint bucket, and the concurrency slot is taken last. The slot
//! rides inside the returned [`Gate`] so it is released on every exit
//! path when the handler's gate drops.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use astrea_domain::error::Error;
use astrea_domain::ids::resolve_request_id;
use astrea_domain::model::AuthContext;

use crate::api::error::ApiError;
use crate::runtime::concurrency::InflightGuard;
use crate::runtime::rate_limit::TokenBuckets;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub enum Endpoint {
    Chat,
    Tool,
    Export,
}

impl Endpoint {
    fn scope(&self) -> &'static str {
        match self {
            Endpoint::Chat => "agent:chat",
            Endpoint::Tool => "agent:tool",
            Endpoint::Export => "agent:export",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Tool => "tool",
            Endpoint::Export => "export",
        }
    }
}

/// An admitted request. Dropping it releases the concurrency slot.
pub struct Gate {
    pub ctx: AuthContext,
    pub request_id: String,
    _permit: Option<InflightGuard>,
}

/// Derive the client IP: `cf-connecting-ip`, else the first entry of
/// `x-forwarded-for`, else `0.0.0.0`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    "0.0.0.0".to_owned()
}

pub fn request_id_from(headers: &HeaderMap) -> String {
    resolve_request_id(headers.get("x-request-id").and_then(|v| v.to_str().ok()))
}

fn bearer_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Run the full admission pipeline for an authenticated endpoint.
///
/// Dev admin bypasses rate and concurrency control but not body caps,
/// which stay with the handlers.
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    endpoint: Endpoint,
) -> Result<Gate, ApiError> {
    let request_id = request_id_from(headers);
    state.metrics.record_request();

    let ctx = state
        .auth
        .authenticate(bearer_from(headers))
        .map_err(|e| ApiError::new(e, request_id.clone()))?;

    if !ctx.has_scope(endpoint.scope()) {
        return Err(ApiError::new(
            Error::Forbidden(format!("missing scope {}", endpoint.scope())),
            request_id,
        ));
    }
    let capability_ok = match endpoint {
        Endpoint::Chat => true,
        Endpoint::Tool => ctx.tools_allowed,
        Endpoint::Export => ctx.export_allowed,
    };
    if !capability_ok {
        return Err(ApiError::new(
            Error::Forbidden(format!("{} is disabled for this token", endpoint.label())),
            request_id,
        ));
    }

    let permit = if ctx.is_dev_admin {
        None
    } else {
        let ip = client_ip(headers);
        check_bucket(state, &state.rates.ip, &ip, &request_id)?;

        let bucket: &TokenBuckets = match endpoint {
            Endpoint::Chat => &state.rates.chat,
            Endpoint::Tool => &state.rates.tool,
            Endpoint::Export => &state.rates.export,
        };
        check_bucket(state, bucket, &ctx.user_id, &request_id)?;

        let max = match endpoint {
            Endpoint::Chat => state.config.limits.concurrency.chat,
            Endpoint::Tool => state.config.limits.concurrency.tool,
            Endpoint::Export => state.config.limits.concurrency.export,
        };
        let key = format!("{}:{}", endpoint.label(), ctx.user_id);
        let permit = state.inflight.acquire(&key, max).ok_or_else(|| {
            state.metrics.record_rate_limited();
            ApiError::new(Error::RateLimited { retry_after: 1 }, request_id.clone())
        })?;
        Some(permit)
    };

    Ok(Gate {
        ctx,
        request_id,
        _permit: permit,
    })
}

pub fn check_bucket(
    state: &AppState,
    bucket: &TokenBuckets,
    key: &str,
    request_id: &str,
) -> Result<(), ApiError> {
    let decision = bucket.allow(key);
    if decision.allowed {
        return Ok(());
    }
    state.metrics.record_rate_limited();
    Err(ApiError::new(
        Error::RateLimited {
            retry_after: decision.retry_after,
        },
        request_id,
    ))
}
