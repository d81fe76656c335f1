//! Bearer-token authentication.
//!
//! Two paths: an exact-match dev-admin token (compared in constant time
//! against a SHA-256 digest read once at startup), and signed bearer
//! tokens verified with either an RS256 public key (SPKI PEM) or an
//! HS256 shared secret. Audience defaults to `agent-worker`; issuer is
//! checked only when configured.

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use astrea_domain::config::AuthConfig;
use astrea_domain::error::{Error, Result};
use astrea_domain::model::AuthContext;

pub struct Authenticator {
    verifier: Option<(DecodingKey, Validation)>,
    /// SHA-256 of the dev-admin token; `None` when the bypass is off.
    dev_admin_hash: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    scope: Option<ScopeClaim>,
    #[serde(default = "default_true")]
    mem: bool,
    #[serde(default = "default_true")]
    tools: bool,
    #[serde(default = "default_true")]
    export: bool,
}

/// `scope` arrives as either an array or a whitespace-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    List(Vec<String>),
    Text(String),
}

fn default_true() -> bool {
    true
}

impl Authenticator {
    pub fn from_config(cfg: &AuthConfig) -> Result<Self> {
        let verifier = if let Some(ref pem) = cfg.public_key_pem {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| Error::Config(format!("invalid RS256 public key: {e}")))?;
            Some((key, Self::validation(Algorithm::RS256, cfg)))
        } else if let Some(ref secret) = cfg.shared_secret {
            let key = DecodingKey::from_secret(secret.as_bytes());
            Some((key, Self::validation(Algorithm::HS256, cfg)))
        } else {
            None
        };

        let dev_admin_hash = cfg
            .dev_admin_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| Sha256::digest(t.as_bytes()).to_vec());

        if verifier.is_none() && dev_admin_hash.is_none() {
            tracing::warn!("no bearer verifier or dev-admin token configured; all requests will be rejected");
        }

        Ok(Self {
            verifier,
            dev_admin_hash,
        })
    }

    fn validation(alg: Algorithm, cfg: &AuthConfig) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_audience(&[&cfg.audience]);
        if let Some(ref issuer) = cfg.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Verify the bearer credential and produce a one-request context.
    pub fn authenticate(&self, bearer: Option<&str>) -> Result<AuthContext> {
        if let (Some(expected), Some(provided)) = (&self.dev_admin_hash, bearer) {
            let digest = Sha256::digest(provided.as_bytes());
            if digest.ct_eq(expected.as_slice()).unwrap_u8() == 1 {
                return Ok(AuthContext::dev_admin());
            }
        }

        let token = bearer.ok_or_else(|| Error::Unauthorized("missing bearer token".into()))?;
        let (key, validation) = self
            .verifier
            .as_ref()
            .ok_or_else(|| Error::Unauthorized("no token verifier configured".into()))?;

        let data = decode::<Claims>(token, key, validation)
            .map_err(|e| Error::Unauthorized(format!("invalid token: {e}")))?;
        let claims = data.claims;

        if claims.sub.len() < 3 {
            return Err(Error::Unauthorized("token subject is too short".into()));
        }

        let scopes: HashSet<String> = match claims.scope {
            Some(ScopeClaim::List(list)) => list.into_iter().collect(),
            Some(ScopeClaim::Text(text)) => {
                text.split_whitespace().map(str::to_owned).collect()
            }
            None => HashSet::new(),
        };

        Ok(AuthContext {
            user_id: claims.sub,
            is_dev_admin: false,
            scopes,
            memory_allowed: claims.mem,
            tools_allowed: claims.tools,
            export_allowed: claims.export,
        })
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "test-secret";

    fn authn(dev_admin: Option<&str>) -> Authenticator {
        Authenticator::from_config(&AuthConfig {
            issuer: None,
            audience: "agent-worker".into(),
            shared_secret: Some(SECRET.into()),
            public_key_pem: None,
            dev_admin_token: dev_admin.map(str::to_owned),
        })
        .unwrap()
    }

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn exp_in(secs: i64) -> i64 {
        chrono::Utc::now().timestamp() + secs
    }

    #[test]
    fn valid_token_with_string_scope() {
        let t = token(json!({
            "sub": "user-1",
            "aud": "agent-worker",
            "exp": exp_in(600),
            "scope": "agent:chat agent:tool",
        }));
        let ctx = authn(None).authenticate(Some(&t)).unwrap();
        assert_eq!(ctx.user_id, "user-1");
        assert!(!ctx.is_dev_admin);
        assert!(ctx.has_scope("agent:chat"));
        assert!(ctx.has_scope("agent:tool"));
        assert!(!ctx.has_scope("agent:export"));
        // Capability flags default to allowed.
        assert!(ctx.memory_allowed && ctx.tools_allowed && ctx.export_allowed);
    }

    #[test]
    fn scope_array_and_explicit_false_flags() {
        let t = token(json!({
            "sub": "user-1",
            "aud": "agent-worker",
            "exp": exp_in(600),
            "scope": ["agent:chat"],
            "mem": false,
            "tools": false,
        }));
        let ctx = authn(None).authenticate(Some(&t)).unwrap();
        assert!(ctx.has_scope("agent:chat"));
        assert!(!ctx.memory_allowed);
        assert!(!ctx.tools_allowed);
        assert!(ctx.export_allowed);
    }

    #[test]
    fn missing_bearer_is_unauthorized() {
        let err = authn(None).authenticate(None).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn expired_token_is_rejected() {
        let t = token(json!({
            "sub": "user-1",
            "aud": "agent-worker",
            "exp": exp_in(-600),
        }));
        assert!(authn(None).authenticate(Some(&t)).is_err());
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let t = token(json!({
            "sub": "user-1",
            "aud": "someone-else",
            "exp": exp_in(600),
        }));
        assert!(authn(None).authenticate(Some(&t)).is_err());
    }

    #[test]
    fn short_subject_is_rejected() {
        let t = token(json!({
            "sub": "ab",
            "aud": "agent-worker",
            "exp": exp_in(600),
        }));
        assert!(authn(None).authenticate(Some(&t)).is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut t = token(json!({
            "sub": "user-1",
            "aud": "agent-worker",
            "exp": exp_in(600),
        }));
        t.pop();
        t.push('A');
        assert!(authn(None).authenticate(Some(&t)).is_err());
    }

    #[test]
    fn dev_admin_exact_match_bypasses() {
        let auth = authn(Some("local-admin-token"));

        let ctx = auth.authenticate(Some("local-admin-token")).unwrap();
        assert!(ctx.is_dev_admin);
        assert_eq!(ctx.user_id, "DEV_ADMIN");

        // A near-miss falls through to (failing) JWT verification.
        assert!(auth.authenticate(Some("local-admin-tokeN")).is_err());
    }
}
