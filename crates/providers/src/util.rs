use astrea_domain::error::Error;

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeouts become `UpstreamTimeout`; everything else `Upstream`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::UpstreamTimeout(e.to_string())
    } else {
        Error::Upstream(e.to_string())
    }
}
