//! Signed artifact URLs.
//!
//! A retrieval URL is authorized by `sig = HMAC-SHA256(secret, key|exp)`
//! alone; no per-user lookup happens on GET. Comparison is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature over `key || "|" || exp`.
pub fn sign_artifact(secret: &str, key: &str, exp: u64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(key.as_bytes());
    mac.update(b"|");
    mac.update(exp.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// True iff the URL is still live (`exp > now`) and the signature matches.
pub fn verify_artifact(secret: &str, key: &str, exp: u64, sig: &str, now: u64) -> bool {
    if exp <= now {
        return false;
    }
    let expected = sign_artifact(secret, key, exp);
    expected.as_bytes().ct_eq(sig.as_bytes()).unwrap_u8() == 1
}

/// Build the full retrieval URL: `<origin>/agent/artifacts/<key>?exp=&sig=`.
pub fn artifact_url(origin: &str, key: &str, exp: u64, sig: &str) -> String {
    format!(
        "{}/agent/artifacts/{}?exp={}&sig={}",
        origin.trim_end_matches('/'),
        urlencoding::encode(key),
        exp,
        sig
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";
    const KEY: &str = "artifacts/ab12cd34/one.svg";

    #[test]
    fn round_trip_verifies() {
        let sig = sign_artifact(SECRET, KEY, 2_000);
        assert!(verify_artifact(SECRET, KEY, 2_000, &sig, 1_000));
    }

    #[test]
    fn expired_url_fails() {
        let sig = sign_artifact(SECRET, KEY, 2_000);
        assert!(!verify_artifact(SECRET, KEY, 2_000, &sig, 2_000));
        assert!(!verify_artifact(SECRET, KEY, 2_000, &sig, 3_000));
    }

    #[test]
    fn any_single_change_fails() {
        let sig = sign_artifact(SECRET, KEY, 2_000);

        // Flip one character of the signature.
        let mut flipped = sig.clone().into_bytes();
        flipped[0] = if flipped[0] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(flipped).unwrap();
        assert!(!verify_artifact(SECRET, KEY, 2_000, &flipped, 1_000));

        // Different key, exp, or secret.
        assert!(!verify_artifact(SECRET, "artifacts/ab12cd34/two.svg", 2_000, &sig, 1_000));
        assert!(!verify_artifact(SECRET, KEY, 2_001, &sig, 1_000));
        assert!(!verify_artifact("other-secret", KEY, 2_000, &sig, 1_000));
    }

    #[test]
    fn url_encodes_the_key() {
        let url = artifact_url("https://agent.example.com/", KEY, 2_000, "abcd");
        assert_eq!(
            url,
            "https://agent.example.com/agent/artifacts/artifacts%2Fab12cd34%2Fone.svg?exp=2000&sig=abcd"
        );
    }
}
