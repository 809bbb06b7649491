#![deny(warnings)]

//! Headless CLI: start a game and play a few rounds by always taking the
//! first offered option.

use anyhow::{Context, Result};
use clap::Parser;
use gm_ai::{BackendConfig, GenerationBackend, OpenAiBackend, ScriptedBackend};
use gm_core::directive::NO_OP_DIRECTIVE;
use gm_core::{RoundDocument, DEFAULT_GAME_ID};
use gm_runtime::{GameMaster, PlayerAction, RuntimeConfig};
use persistence::{default_local_path, LocalFileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "gm-cli",
    about = "Play rounds headlessly against the game master",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ", ", env!("BUILD_DATE"), ")")
)]
struct Args {
    /// Rounds to play after setup.
    #[arg(long, default_value_t = 3)]
    turns: u32,
    #[arg(long, default_value = DEFAULT_GAME_ID)]
    game_id: String,
    /// JSON file the rounds are saved to.
    #[arg(long, default_value = default_local_path())]
    save: PathBuf,
    /// Free-text world settings passed to setup.
    #[arg(long, default_value = "")]
    settings: String,
    /// Continue the saved game instead of starting a new one.
    #[arg(long)]
    resume: bool,
    /// YAML file with runtime rules (schema, roster, limits).
    #[arg(long)]
    rules: Option<PathBuf>,
    #[arg(long, env = "GM_BACKEND_URL")]
    backend_url: Option<String>,
    #[arg(long, env = "GM_MODEL")]
    model: Option<String>,
    #[arg(long, env = "GM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Use the built-in scripted backend; no network access.
    #[arg(long)]
    offline: bool,
}

impl Args {
    fn backend(&self) -> Result<Arc<dyn GenerationBackend>> {
        if self.offline {
            return Ok(Arc::new(ScriptedBackend::new()));
        }
        let key = self
            .api_key
            .as_deref()
            .context("GM_API_KEY (or --api-key) is required unless --offline is set")?;
        let mut cfg = BackendConfig::default();
        if let Some(url) = &self.backend_url {
            cfg.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        Ok(Arc::new(OpenAiBackend::new(cfg.build_client()?, &cfg, key)))
    }

    fn rules(&self) -> Result<RuntimeConfig> {
        match &self.rules {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading rules {}", path.display()))?;
                RuntimeConfig::from_yaml_str(&text)
                    .with_context(|| format!("parsing rules {}", path.display()))
            }
            None => Ok(RuntimeConfig::default()),
        }
    }
}

fn summary_line(doc: &RoundDocument) -> String {
    let attrs: Vec<String> = doc
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!(
        "round {} | turn {} | {} | history: {}",
        doc.round_id,
        doc.turn,
        attrs.join(" "),
        doc.history.len()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    info!(game_id = %args.game_id, turns = args.turns, offline = args.offline, "starting CLI");

    let store = Arc::new(LocalFileStore::new(&args.save));
    let master = GameMaster::new(args.backend()?, store, Arc::new(args.rules()?));

    let mut doc = if args.resume {
        master.load(&args.game_id).await?
    } else {
        master.init(&args.game_id, &args.settings).await?
    };
    println!("{}", summary_line(&doc));

    for _ in 0..args.turns {
        let label = doc
            .current_options
            .first()
            .map(|o| o.label.clone())
            .unwrap_or_else(|| NO_OP_DIRECTIVE.to_string());
        let action = PlayerAction {
            label: label.clone(),
            game_id: args.game_id.clone(),
            ..PlayerAction::default()
        };
        let report = master.act_on(&doc, &action).await?;
        doc = report.document;
        println!("> {label}");
        println!("{}", summary_line(&doc));
        if !report.event_summary.is_empty() {
            println!("  {}", report.event_summary);
        }
    }

    println!("saved to {}", args.save.display());
    Ok(())
}
