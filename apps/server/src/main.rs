#![deny(warnings)]

//! HTTP shell of the game master: credential extraction, routing, event
//! streaming and the storage toggle.

mod auth;
mod config;
mod error;
mod routes;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ServerConfig, StorageMode};
use gm_ai::{GenerationBackend, OpenAiBackend, ScriptedBackend};
use state::{open_store, AppState, BackendFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "server", about = "Game master HTTP server")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:8000.
    #[arg(long, env = "GM_BIND")]
    bind: Option<String>,
    /// LOCAL or CLOUD.
    #[arg(long, env = "STORAGE_MODE")]
    storage_mode: Option<StorageMode>,
    /// Base URL of the OpenAI-compatible backend.
    #[arg(long, env = "GM_BACKEND_URL")]
    backend_url: Option<String>,
    #[arg(long, env = "GM_MODEL")]
    model: Option<String>,
    /// Answer every generation call from the built-in script.
    #[arg(long)]
    offline: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            cfg.bind = bind.clone();
        }
        if let Some(mode) = self.storage_mode {
            cfg.storage.mode = mode;
        }
        if let Some(url) = &self.backend_url {
            cfg.backend.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            cfg.backend.model = model.clone();
        }
    }
}

fn backend_factory(cfg: &ServerConfig, offline: bool) -> Result<BackendFactory> {
    if offline {
        let scripted: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::new());
        return Ok(Arc::new(move |_key: &str| scripted.clone()));
    }
    let client = cfg.backend.build_client()?;
    let backend_cfg = cfg.backend.clone();
    Ok(Arc::new(move |key: &str| {
        Arc::new(OpenAiBackend::new(client.clone(), &backend_cfg, key)) as Arc<dyn GenerationBackend>
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut cfg = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut cfg);
    info!(bind = %cfg.bind, mode = %cfg.storage.mode, model = %cfg.backend.model, offline = cli.offline, "starting server");

    let (mode, store) = match open_store(cfg.storage.mode, &cfg.storage).await {
        Ok(store) => (cfg.storage.mode, store),
        Err(e) if cfg.storage.mode == StorageMode::Cloud => {
            warn!(error = %e, "cloud store unavailable; falling back to local file");
            (StorageMode::Local, open_store(StorageMode::Local, &cfg.storage).await?)
        }
        Err(e) => return Err(e.into()),
    };

    let state = AppState::new(
        mode,
        store,
        cfg.storage.clone(),
        backend_factory(&cfg, cli.offline)?,
        cfg.runtime.clone(),
        cfg.stream_buffer,
    );
    let listener = TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
