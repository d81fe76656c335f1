//! Request-id synthesis and user-id hashing.
//!
//! Raw user ids never appear in logs or object-store keys; they are
//! reduced to a short SHA-256 prefix first.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a fresh request id: `req_` + 32 hex chars (128-bit random).
pub fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Use the client-supplied id verbatim when non-empty, else generate.
pub fn resolve_request_id(client_supplied: Option<&str>) -> String {
    match client_supplied {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => new_request_id(),
    }
}

/// Short stable hash of a user id (first 16 hex chars of SHA-256).
pub fn user_hash(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_shape() {
        let id = new_request_id();
        assert!(id.starts_with("req_"));
        let body = &id[4..];
        assert_eq!(body.len(), 32);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn client_supplied_id_is_kept_verbatim() {
        assert_eq!(resolve_request_id(Some("req_abc")), "req_abc");
        assert!(resolve_request_id(Some("")).starts_with("req_"));
        assert!(resolve_request_id(Some("   ")).starts_with("req_"));
        assert!(resolve_request_id(None).starts_with("req_"));
    }

    #[test]
    fn user_hash_is_stable_and_short() {
        assert_eq!(user_hash("user-123"), user_hash("user-123"));
        assert_ne!(user_hash("user-123"), user_hash("user-124"));
        assert_eq!(user_hash("user-123").len(), 16);
    }
}
