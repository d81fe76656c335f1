//! Shared application state passed to all API handlers.

use std::sync::Arc;

use astrea_domain::config::Config;
use astrea_domain::error::Result;
use astrea_providers::LlmProvider;
use astrea_store::Store;
use astrea_vector::VectorIndex;

use crate::api::auth::Authenticator;
use crate::runtime::actors::ActorMap;
use crate::runtime::concurrency::InflightMap;
use crate::runtime::metrics::Metrics;
use crate::runtime::objects::ObjectStore;
use crate::runtime::rate_limit::RateLimiter;

/// Fields are grouped by concern:
/// - **Core services** — config, auth, persistence, model, index, objects
/// - **Actor runtime** — user → actor routing
/// - **Abuse controls** — rate buckets, in-flight counters
/// - **Observability** — process-wide counters
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub auth: Arc<Authenticator>,
    /// `None` when no persistence binding is configured (dev only).
    pub store: Option<Arc<Store>>,
    pub llm: Arc<dyn LlmProvider>,
    /// `None` disables semantic recall.
    pub vector: Option<Arc<dyn VectorIndex>>,
    pub objects: Arc<dyn ObjectStore>,
    /// Client for the natal compute backend, built with its 8 s timeout.
    pub backend_http: reqwest::Client,

    // ── Actor runtime ─────────────────────────────────────────────────
    pub actors: Arc<ActorMap>,

    // ── Abuse controls ────────────────────────────────────────────────
    pub rates: Arc<RateLimiter>,
    pub inflight: Arc<InflightMap>,

    // ── Observability ─────────────────────────────────────────────────
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Option<Arc<Store>>,
        llm: Arc<dyn LlmProvider>,
        vector: Option<Arc<dyn VectorIndex>>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let auth = Authenticator::from_config(&config.auth)?;
        let rates = RateLimiter::from_config(&config.limits.rates);
        let backend_http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.backend.timeout_ms))
            .build()
            .map_err(|e| astrea_domain::Error::Internal(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            store,
            llm,
            vector,
            objects,
            backend_http,
            actors: Arc::new(ActorMap::new()),
            rates: Arc::new(rates),
            inflight: Arc::new(InflightMap::new()),
            metrics: Arc::new(Metrics::new()),
        })
    }
}
