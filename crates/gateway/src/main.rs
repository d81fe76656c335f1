use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use astrea_domain::config::Config;
use astrea_gateway::api;
use astrea_gateway::runtime::objects::{FsObjectStore, ObjectStore};
use astrea_gateway::state::AppState;
use astrea_providers::{LlmProvider, OpenAiCompatProvider};
use astrea_store::Store;
use astrea_vector::{RestVectorIndex, VectorIndex};

#[derive(Parser)]
#[command(name = "astrea", about = "Edge-deployed per-user agent gateway")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "ASTREA_CONFIG", default_value = "./config.toml")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astrea=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config).context("loading config")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let store = match config.store.path {
        Some(ref path) => {
            let store = Store::open(path).context("opening persistence store")?;
            tracing::info!(path = %path.display(), "persistence store opened");
            Some(Arc::new(store))
        }
        None if config.is_production() => {
            // Tolerated at boot so /health and /agent/status stay up;
            // chat and tool requests surface 500 missing_binding.
            tracing::error!("production deployment without a persistence binding");
            None
        }
        None => {
            tracing::warn!("no persistence binding configured; memory features are limited");
            None
        }
    };

    let llm: Arc<dyn LlmProvider> =
        Arc::new(OpenAiCompatProvider::from_config(&config.llm).context("building LLM adapter")?);
    let vector: Option<Arc<dyn VectorIndex>> = RestVectorIndex::from_config(&config.vector)
        .context("building vector index client")?
        .map(|index| Arc::new(index) as Arc<dyn VectorIndex>);
    if vector.is_none() {
        tracing::info!("vector index not configured; recall uses pinned memories only");
    }
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.artifacts.root.clone()));

    let state = AppState::new(config, store, llm, vector, objects)?;

    // ── Periodic maintenance: idle rate buckets and idle actors ──────
    {
        let rates = state.rates.clone();
        let actors = state.actors.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                rates.prune_idle();
                actors.prune_idle(Duration::from_secs(1_800));
            }
        });
    }

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(
        addr = %addr,
        environment = %state.config.environment,
        "astrea gateway listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
