/// Shared error type used across all Astrea crates.
///
/// Variants correspond to the wire-level error taxonomy: each one maps to
/// exactly one HTTP status and one stable `code` string that clients can
/// branch on. Infrastructure errors (`Io`, `Json`, `Storage`) surface as
/// `internal_error` at the edge.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("missing binding: {0}")]
    MissingBinding(String),

    #[error("upstream: {0}")]
    Upstream(String),

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage: {0}")]
    Storage(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed => 405,
            Error::PayloadTooLarge(_) => 413,
            Error::RateLimited { .. } => 429,
            Error::Upstream(_) => 502,
            Error::UpstreamTimeout(_) => 504,
            Error::MissingBinding(_) => 500,
            Error::Io(_)
            | Error::Json(_)
            | Error::Storage(_)
            | Error::Config(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Stable wire code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::MethodNotAllowed => "method_not_allowed",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::RateLimited { .. } => "rate_limited",
            Error::MissingBinding(_) => "missing_binding",
            Error::Upstream(_) => "upstream_error",
            Error::UpstreamTimeout(_) => "upstream_timeout",
            Error::Io(_)
            | Error::Json(_)
            | Error::Storage(_)
            | Error::Config(_)
            | Error::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_mapping() {
        assert_eq!(Error::BadRequest("x".into()).status(), 400);
        assert_eq!(Error::Unauthorized("x".into()).code(), "unauthorized");
        assert_eq!(Error::RateLimited { retry_after: 3 }.status(), 429);
        assert_eq!(Error::MissingBinding("db".into()).status(), 500);
        assert_eq!(Error::MissingBinding("db".into()).code(), "missing_binding");
        assert_eq!(Error::Upstream("x".into()).status(), 502);
        assert_eq!(Error::UpstreamTimeout("x".into()).status(), 504);
        assert_eq!(Error::Storage("x".into()).code(), "internal_error");
    }
}
