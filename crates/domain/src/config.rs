use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    /// Deployment environment tag ("production" enables strict binding checks).
    #[serde(default = "d_env")]
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            backend: BackendConfig::default(),
            llm: LlmConfig::default(),
            vector: VectorConfig::default(),
            store: StoreConfig::default(),
            artifacts: ArtifactsConfig::default(),
            environment: d_env(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, then apply env-var overrides.
    ///
    /// A missing file is not an error — defaults apply (dev mode).
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let mut cfg: Config = match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Secrets come from the environment, never from the config file.
    /// Read once at startup.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ASTREA_AUTH_SECRET") {
            if !v.is_empty() {
                self.auth.shared_secret = Some(v);
            }
        }
        if let Ok(v) = std::env::var("ASTREA_AUTH_PUBLIC_KEY_PEM") {
            if !v.is_empty() {
                self.auth.public_key_pem = Some(v);
            }
        }
        if let Ok(v) = std::env::var("ASTREA_DEV_ADMIN_TOKEN") {
            if !v.is_empty() {
                self.auth.dev_admin_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("ASTREA_SIGNING_KEY") {
            if !v.is_empty() {
                self.artifacts.signing_key = v;
            }
        }
        if let Ok(v) = std::env::var("ASTREA_ENV") {
            if !v.is_empty() {
                self.environment = v;
            }
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8720")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Public origin used when building artifact retrieval URLs
    /// (e.g. `https://agent.example.com`).
    #[serde(default = "d_origin")]
    pub public_origin: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8720,
            host: "127.0.0.1".into(),
            public_origin: d_origin(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected `iss` claim. When unset, issuer is not checked.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim.
    #[serde(default = "d_audience")]
    pub audience: String,
    /// HS256 shared secret (env: `ASTREA_AUTH_SECRET`).
    #[serde(default, skip_serializing)]
    pub shared_secret: Option<String>,
    /// RS256 public key, SPKI PEM (env: `ASTREA_AUTH_PUBLIC_KEY_PEM`).
    /// Takes precedence over the shared secret when both are set.
    #[serde(default, skip_serializing)]
    pub public_key_pem: Option<String>,
    /// Exact-match bypass token for local development
    /// (env: `ASTREA_DEV_ADMIN_TOKEN`).
    #[serde(default, skip_serializing)]
    pub dev_admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: d_audience(),
            shared_secret: None,
            public_key_pem: None,
            dev_admin_token: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Size caps & abuse-control limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "d_40")]
    pub max_turns: usize,
    #[serde(default = "d_400")]
    pub max_memories: usize,
    #[serde(default = "d_4000")]
    pub max_msg_chars: usize,
    #[serde(default = "d_8000")]
    pub max_page_ctx_chars: usize,
    #[serde(default = "d_20000")]
    pub max_total_ctx_chars: usize,
    /// Chat / export request body cap in bytes.
    #[serde(default = "d_64k")]
    pub chat_body_cap: usize,
    /// Tool request body cap in bytes.
    #[serde(default = "d_16k")]
    pub tool_body_cap: usize,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_turns: 40,
            max_memories: 400,
            max_msg_chars: 4_000,
            max_page_ctx_chars: 8_000,
            max_total_ctx_chars: 20_000,
            chat_body_cap: 64 * 1024,
            tool_body_cap: 16 * 1024,
            rates: RatesConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Per-minute token-bucket rates. Capacity equals the rate; refill is
/// `rate / 60` tokens per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    #[serde(default = "d_20f")]
    pub chat_per_min: f64,
    #[serde(default = "d_10f")]
    pub tool_per_min: f64,
    #[serde(default = "d_6f")]
    pub export_per_min: f64,
    #[serde(default = "d_60f")]
    pub artifact_per_min: f64,
    #[serde(default = "d_120f")]
    pub ip_per_min: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            chat_per_min: 20.0,
            tool_per_min: 10.0,
            export_per_min: 6.0,
            artifact_per_min: 60.0,
            ip_per_min: 120.0,
        }
    }
}

/// Per-user in-flight request caps per endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "d_4u")]
    pub chat: u32,
    #[serde(default = "d_2u")]
    pub tool: u32,
    #[serde(default = "d_2u")]
    pub export: u32,
    #[serde(default = "d_8u")]
    pub artifact: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            chat: 4,
            tool: 2,
            export: 2,
            artifact: 8,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External services
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The untrusted natal/ephemeris compute backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "d_backend_url")]
    pub base_url: String,
    #[serde(default = "d_8000u")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_backend_url(),
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_llm_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "d_chat_model")]
    pub chat_model: String,
    #[serde(default = "d_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "d_15000u")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_url(),
            api_key: None,
            chat_model: d_chat_model(),
            embedding_model: d_embedding_model(),
            timeout_ms: 15_000,
        }
    }
}

/// External vector index. `base_url = None` disables semantic recall.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VectorConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "d_5000u")]
    pub timeout_ms: u64,
}

impl VectorConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

/// Relational persistence. `path = None` means no binding: tolerated in
/// dev, a `missing_binding` error in production.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root directory of the object-store binding.
    #[serde(default = "d_artifacts_root")]
    pub root: PathBuf,
    /// Signed-URL lifetime in seconds.
    #[serde(default = "d_900u")]
    pub ttl_secs: u64,
    /// HMAC key for signed retrieval URLs (env: `ASTREA_SIGNING_KEY`).
    #[serde(default = "d_dev_signing_key", skip_serializing)]
    pub signing_key: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: d_artifacts_root(),
            ttl_secs: 900,
            signing_key: d_dev_signing_key(),
        }
    }
}

// ── serde default helpers ────────────────────────────────────────────

fn d_env() -> String {
    "development".into()
}
fn d_8720() -> u16 {
    8720
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_origin() -> String {
    "http://127.0.0.1:8720".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn d_audience() -> String {
    "agent-worker".into()
}
fn d_40() -> usize {
    40
}
fn d_400() -> usize {
    400
}
fn d_4000() -> usize {
    4_000
}
fn d_8000() -> usize {
    8_000
}
fn d_20000() -> usize {
    20_000
}
fn d_64k() -> usize {
    64 * 1024
}
fn d_16k() -> usize {
    16 * 1024
}
fn d_20f() -> f64 {
    20.0
}
fn d_10f() -> f64 {
    10.0
}
fn d_6f() -> f64 {
    6.0
}
fn d_60f() -> f64 {
    60.0
}
fn d_120f() -> f64 {
    120.0
}
fn d_4u() -> u32 {
    4
}
fn d_2u() -> u32 {
    2
}
fn d_8u() -> u32 {
    8
}
fn d_backend_url() -> String {
    "http://127.0.0.1:8731".into()
}
fn d_llm_url() -> String {
    "http://127.0.0.1:8741/v1".into()
}
fn d_chat_model() -> String {
    "astrea-chat-1".into()
}
fn d_embedding_model() -> String {
    "astrea-embed-1".into()
}
fn d_5000u() -> u64 {
    5_000
}
fn d_8000u() -> u64 {
    8_000
}
fn d_15000u() -> u64 {
    15_000
}
fn d_900u() -> u64 {
    900
}
fn d_artifacts_root() -> PathBuf {
    PathBuf::from("./data/artifacts")
}
fn d_dev_signing_key() -> String {
    "astrea-dev-signing-key".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.limits.max_turns, 40);
        assert_eq!(cfg.limits.chat_body_cap, 65_536);
        assert_eq!(cfg.limits.tool_body_cap, 16_384);
        assert_eq!(cfg.auth.audience, "agent-worker");
        assert_eq!(cfg.artifacts.ttl_secs, 900);
        assert!(!cfg.is_production());
        assert!(!cfg.vector.is_configured());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            environment = "production"

            [limits]
            max_turns = 12

            [vector]
            base_url = "http://index.internal"
            "#,
        )
        .unwrap();
        assert!(cfg.is_production());
        assert_eq!(cfg.limits.max_turns, 12);
        assert_eq!(cfg.limits.max_memories, 400);
        assert!(cfg.vector.is_configured());
    }
}
