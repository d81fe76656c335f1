//! The natal export tool backend call.
//!
//! The backend is an untrusted upstream: its response is parsed, deep
//! redaction is applied by the caller, and nothing from it reaches a
//! client unredacted.

use serde_json::Value;

use astrea_domain::config::BackendConfig;
use astrea_domain::error::{Error, Result};

/// The fixed tool allow-list is exactly this one name.
pub const TOOL_NAME: &str = "natal_export_full";

/// Audit rows store arguments and sanitized output truncated to this.
pub const AUDIT_TRUNCATE_CHARS: usize = 2_000;

/// POST the validated args to the compute backend.
///
/// The client was built with the configured 8 s timeout; exceeding it
/// yields `upstream_timeout`, any non-2xx yields `upstream_error`.
pub async fn call_natal_backend(
    http: &reqwest::Client,
    cfg: &BackendConfig,
    request_id: &str,
    user_id: &str,
    args: &Value,
) -> Result<Value> {
    let url = format!(
        "{}/tools/natal/export_full",
        cfg.base_url.trim_end_matches('/')
    );

    let resp = http
        .post(&url)
        .header("content-type", "application/json")
        .header("x-request-id", request_id)
        .header("x-user-id", user_id)
        .json(args)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::UpstreamTimeout("natal backend timed out".into())
            } else {
                Error::Upstream(format!("natal backend unreachable: {e}"))
            }
        })?;

    let status = resp.status();
    let text = resp.text().await.map_err(|e| {
        if e.is_timeout() {
            Error::UpstreamTimeout("natal backend timed out".into())
        } else {
            Error::Upstream(format!("natal backend read failed: {e}"))
        }
    })?;

    if !status.is_success() {
        return Err(Error::Upstream(format!("natal backend returned {status}")));
    }

    serde_json::from_str(&text)
        .map_err(|e| Error::Upstream(format!("natal backend sent invalid JSON: {e}")))
}

/// Char-safe truncation for audit storage.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    s.chars().take(max).collect()
}
